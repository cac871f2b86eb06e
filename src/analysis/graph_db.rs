//! Graph database integration with Neo4j

use std::collections::HashSet;

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Row};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::models::{
    chapter_name, section_number, HopRange, NodeScope, OffenseTuple, RelatedInfo,
};
use crate::config::Neo4jConfig;
use crate::metrics;
use crate::{Error, Result};

/// Uniqueness constraints on the key property of each node label.
const SCHEMA_CONSTRAINTS: [&str; 4] = [
    "CREATE CONSTRAINT offense_name IF NOT EXISTS FOR (o:Offense) REQUIRE o.name IS UNIQUE",
    "CREATE CONSTRAINT chapter_name IF NOT EXISTS FOR (c:Chapter) REQUIRE c.name IS UNIQUE",
    "CREATE CONSTRAINT section_number IF NOT EXISTS FOR (s:Section) REQUIRE s.number IS UNIQUE",
    "CREATE CONSTRAINT punishment_description IF NOT EXISTS FOR (p:Punishment) REQUIRE p.description IS UNIQUE",
];

/// Single auto-committed statement; a failure leaves nothing behind.
const UPSERT_OFFENSE: &str = "MERGE (o:Offense {name: $offence})
     MERGE (c:Chapter {name: $chapter})
     MERGE (s:Section {number: $section})
     MERGE (p:Punishment {description: $punishment})
     MERGE (o)-[:refersToChapter]->(c)
     MERGE (o)-[:refersToSection]->(s)
     MERGE (o)-[:hasPunishment]->(p)";

/// Property graph holding Offense, Chapter, Section and Punishment nodes.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Merge the four nodes of a tuple and the three Offense edges.
    async fn upsert_offense(&self, tuple: &OffenseTuple) -> Result<()>;

    /// Unique node names, first occurrence order.
    async fn fetch_all_node_names(&self, scope: NodeScope) -> Result<Vec<String>>;

    /// Nodes within `hops` of any node whose name or number contains
    /// `node_name` (case-insensitive).
    async fn fetch_related(&self, node_name: &str, hops: HopRange) -> Result<Vec<RelatedInfo>>;

    async fn count_offenses(&self) -> Result<u64>;
}

/// Outcome of a batch graph write.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub written: usize,
    pub failed: usize,
}

/// Upsert every tuple; a failing record is logged and skipped.
pub async fn create_knowledge_graph(store: &dyn GraphStore, tuples: &[OffenseTuple]) -> IngestReport {
    let mut report = IngestReport::default();

    for (i, tuple) in tuples.iter().enumerate() {
        match store.upsert_offense(tuple).await {
            Ok(()) => report.written += 1,
            Err(err) => {
                warn!(
                    index = i,
                    offense = %tuple.offense,
                    chapter = %tuple.chapter,
                    section = %tuple.section,
                    "Failed to create graph for tuple: {}",
                    err
                );
                report.failed += 1;
            }
        }
    }

    metrics::record_ingested(report.written, report.failed);
    info!(
        "Graph creation complete: {} written, {} failed",
        report.written, report.failed
    );
    report
}

/// Keep the first occurrence of every name.
pub fn dedup_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// First non-empty of name / number / description.
pub fn first_non_empty(candidates: &[Option<String>]) -> String {
    candidates
        .iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .cloned()
        .unwrap_or_default()
}

/// Graph store backed by Neo4j
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    /// Connect to Neo4j server
    pub async fn connect(config: &Neo4jConfig) -> Result<Self> {
        let neo_config = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.username.as_str())
            .password(config.password.as_str())
            .db(config.database.as_str())
            .build()
            .map_err(|e| Error::Config(format!("invalid Neo4j settings: {}", e)))?;

        info!(uri = %config.uri, database = %config.database, "Connecting to Neo4j...");
        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| Error::ConnectionError(format!("Cannot connect to Neo4j: {}", e)))?;

        let store = Self { graph };
        let count = store.count_offenses().await?;
        info!("Connected! Found {} offenses in knowledge graph", count);
        Ok(store)
    }

    /// Create uniqueness constraints for node keys
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing Neo4j schema...");

        for constraint in SCHEMA_CONSTRAINTS {
            self.graph.run(query(constraint)).await?;
        }

        info!("Schema initialized successfully");
        Ok(())
    }

    fn related_cypher(hops: HopRange) -> String {
        format!(
            "MATCH (n)
             WHERE toLower(n.name) CONTAINS toLower($node_name)
                OR toLower(n.number) CONTAINS toLower($node_name)
             WITH n
             MATCH (n)-[*{}..{}]-(related)
             WITH DISTINCT related
             RETURN related.name AS name,
                    related.number AS number,
                    related.description AS description,
                    labels(related) AS labels",
            hops.min, hops.max
        )
    }
}

fn optional_text(row: &Row, key: &str) -> Option<String> {
    match row.get::<Option<String>>(key) {
        Ok(value) => value,
        Err(_) => row.get::<i64>(key).ok().map(|n| n.to_string()),
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn upsert_offense(&self, tuple: &OffenseTuple) -> Result<()> {
        let q = query(UPSERT_OFFENSE)
            .param("offence", tuple.offense.clone())
            .param("chapter", chapter_name(&tuple.chapter))
            .param("section", section_number(&tuple.section))
            .param("punishment", tuple.punishment.clone());

        self.graph.run(q).await?;

        debug!("Upserted offense: {}", tuple.offense);
        Ok(())
    }

    async fn fetch_all_node_names(&self, scope: NodeScope) -> Result<Vec<String>> {
        let cypher = match scope {
            NodeScope::Offenses => {
                "MATCH (n:Offense) WHERE n.name IS NOT NULL RETURN DISTINCT n.name AS name"
            }
            NodeScope::AllNamed => "MATCH (n) WHERE n.name IS NOT NULL RETURN DISTINCT n.name AS name",
        };

        let mut result = self.graph.execute(query(cypher)).await?;
        let mut names = Vec::new();

        while let Some(row) = result.next().await? {
            match optional_text(&row, "name") {
                Some(name) => names.push(name),
                None => debug!("Skipping node with non-text name"),
            }
        }

        let names = dedup_names(names);
        info!("Loaded {} node names ({:?})", names.len(), scope);
        Ok(names)
    }

    async fn fetch_related(&self, node_name: &str, hops: HopRange) -> Result<Vec<RelatedInfo>> {
        let q = query(&Self::related_cypher(hops)).param("node_name", node_name);

        let mut result = self.graph.execute(q).await?;
        let mut seen = HashSet::new();
        let mut related = Vec::new();

        while let Some(row) = result.next().await? {
            let info = first_non_empty(&[
                optional_text(&row, "name"),
                optional_text(&row, "number"),
                optional_text(&row, "description"),
            ]);
            let labels: Vec<String> = row.get("labels").unwrap_or_default();

            if seen.insert((info.clone(), labels.clone())) {
                related.push(RelatedInfo { info, labels });
            }
        }

        debug!("Fetched {} related nodes for {}", related.len(), node_name);
        Ok(related)
    }

    async fn count_offenses(&self) -> Result<u64> {
        let mut result = self
            .graph
            .execute(query("MATCH (n:Offense) RETURN count(n) AS count"))
            .await?;

        if let Some(row) = result.next().await? {
            let count: i64 = row.get("count").unwrap_or(0);
            return Ok(count.max(0) as u64);
        }

        Ok(0)
    }
}
