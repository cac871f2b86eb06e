//! In-process property graph with the same semantics as [`Neo4jStore`].
//!
//! [`Neo4jStore`]: super::graph_db::Neo4jStore

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use super::graph_db::{first_non_empty, GraphStore};
use super::models::{
    chapter_name, section_number, HopRange, NodeScope, OffenseTuple, RelatedInfo, CHAPTER_LABEL,
    HAS_PUNISHMENT, OFFENSE_LABEL, PUNISHMENT_LABEL, REFERS_TO_CHAPTER, REFERS_TO_SECTION,
    SECTION_LABEL,
};
use crate::{Error, Result};

pub type NodeId = usize;

/// Graph node: one label plus the three textual properties.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub label: String,
    pub name: Option<String>,
    pub number: Option<String>,
    pub description: Option<String>,
}

impl Node {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn key(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.number.as_deref())
            .or(self.description.as_deref())
    }

    fn info(&self) -> String {
        first_non_empty(&[
            self.name.clone(),
            self.number.clone(),
            self.description.clone(),
        ])
    }

    fn matches(&self, needle: &str) -> bool {
        [&self.name, &self.number]
            .into_iter()
            .flatten()
            .any(|v| v.to_lowercase().contains(needle))
    }
}

/// Directed relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub relation: String,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: Vec<Node>,
    keys: HashMap<(String, String), NodeId>,
    edges: Vec<Edge>,
    edge_set: HashSet<Edge>,
}

impl Inner {
    /// MERGE on (label, key property).
    fn merge_node(&mut self, node: Node) -> NodeId {
        let key = node.key().map(|k| (node.label.clone(), k.to_string()));
        if let Some(id) = key.as_ref().and_then(|k| self.keys.get(k)) {
            return *id;
        }

        let id = self.nodes.len();
        self.nodes.push(node);
        if let Some(key) = key {
            self.keys.insert(key, id);
        }
        id
    }

    fn merge_edge(&mut self, from: NodeId, relation: &str, to: NodeId) {
        let edge = Edge {
            from,
            to,
            relation: relation.to_string(),
        };
        if self.edge_set.insert(edge.clone()) {
            self.edges.push(edge);
        }
    }

    /// Undirected neighbours reachable through edge `idx`.
    fn incident(&self, node: NodeId) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter_map(move |(idx, e)| {
                if e.from == node {
                    Some((idx, e.to))
                } else if e.to == node {
                    Some((idx, e.from))
                } else {
                    None
                }
            })
    }
}

/// Lightweight legal graph (in-memory).
#[derive(Debug, Default)]
pub struct MemoryGraph {
    inner: RwLock<Inner>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an arbitrary node (returns the existing id on key match).
    pub fn add_node(&self, node: Node) -> NodeId {
        self.write().merge_node(node)
    }

    pub fn add_edge(&self, from: NodeId, relation: &str, to: NodeId) {
        self.write().merge_edge(from, relation, to);
    }

    pub fn node_count(&self) -> usize {
        self.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.read().edges.len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn upsert_offense(&self, tuple: &OffenseTuple) -> Result<()> {
        if tuple.offense.trim().is_empty() {
            return Err(Error::Graph("offense name must not be empty".to_string()));
        }

        let mut inner = self.write();
        let offense = inner.merge_node(Node::new(OFFENSE_LABEL).with_name(&tuple.offense));
        let chapter = inner.merge_node(Node::new(CHAPTER_LABEL).with_name(chapter_name(&tuple.chapter)));
        let section =
            inner.merge_node(Node::new(SECTION_LABEL).with_number(section_number(&tuple.section)));
        let punishment =
            inner.merge_node(Node::new(PUNISHMENT_LABEL).with_description(&tuple.punishment));

        inner.merge_edge(offense, REFERS_TO_CHAPTER, chapter);
        inner.merge_edge(offense, REFERS_TO_SECTION, section);
        inner.merge_edge(offense, HAS_PUNISHMENT, punishment);
        Ok(())
    }

    async fn fetch_all_node_names(&self, scope: NodeScope) -> Result<Vec<String>> {
        let inner = self.read();
        let names = inner
            .nodes
            .iter()
            .filter(|n| scope == NodeScope::AllNamed || n.label == OFFENSE_LABEL)
            .filter_map(|n| n.name.clone());
        Ok(super::graph_db::dedup_names(names))
    }

    async fn fetch_related(&self, node_name: &str, hops: HopRange) -> Result<Vec<RelatedInfo>> {
        let inner = self.read();
        let needle = node_name.to_lowercase();

        let starts: Vec<NodeId> = inner
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.matches(&needle))
            .map(|(id, _)| id)
            .collect();

        // Cypher path semantics: a relationship is used at most once per path.
        let mut reached = Vec::new();
        let mut seen_nodes = HashSet::new();
        for start in starts {
            let mut frontier: Vec<(NodeId, Vec<usize>)> = vec![(start, Vec::new())];
            for depth in 1..=hops.max {
                let mut next = Vec::new();
                for (node, used) in &frontier {
                    for (edge_idx, neighbour) in inner.incident(*node) {
                        if used.contains(&edge_idx) {
                            continue;
                        }
                        let mut path = used.clone();
                        path.push(edge_idx);
                        if depth >= hops.min && seen_nodes.insert(neighbour) {
                            reached.push(neighbour);
                        }
                        next.push((neighbour, path));
                    }
                }
                frontier = next;
            }
        }

        let mut seen = HashSet::new();
        Ok(reached
            .into_iter()
            .map(|id| {
                let node = &inner.nodes[id];
                RelatedInfo {
                    info: node.info(),
                    labels: vec![node.label.clone()],
                }
            })
            .filter(|r| seen.insert((r.info.clone(), r.labels.clone())))
            .collect())
    }

    async fn count_offenses(&self) -> Result<u64> {
        Ok(self
            .read()
            .nodes
            .iter()
            .filter(|n| n.label == OFFENSE_LABEL)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theft() -> OffenseTuple {
        OffenseTuple::new("Theft", "17", "303", "Imprisonment up to 3 years, or fine, or both")
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let graph = MemoryGraph::new();
        graph.upsert_offense(&theft()).await.unwrap();
        graph.upsert_offense(&theft()).await.unwrap();

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.count_offenses().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reingest_with_new_section_adds_edges() {
        let graph = MemoryGraph::new();
        graph.upsert_offense(&theft()).await.unwrap();
        graph
            .upsert_offense(&OffenseTuple::new("Theft", "17", "304", "Snatching penalty"))
            .await
            .unwrap();

        // Shared chapter, two sections, two punishments
        assert_eq!(graph.node_count(), 6);
        assert_eq!(graph.edge_count(), 5);

        let related = graph.fetch_related("Theft", HopRange::new(1, 1)).await.unwrap();
        let infos: Vec<_> = related.iter().map(|r| r.info.as_str()).collect();
        assert!(infos.contains(&"Section No.: 303"));
        assert!(infos.contains(&"Section No.: 304"));
    }

    #[tokio::test]
    async fn fetch_names_respects_scope() {
        let graph = MemoryGraph::new();
        graph.upsert_offense(&theft()).await.unwrap();

        let offenses = graph.fetch_all_node_names(NodeScope::Offenses).await.unwrap();
        assert_eq!(offenses, vec!["Theft"]);

        let all = graph.fetch_all_node_names(NodeScope::AllNamed).await.unwrap();
        assert_eq!(all, vec!["Theft", "Chapter No.: 17"]);
    }

    #[tokio::test]
    async fn related_returns_one_hop_attributes_in_order() {
        let graph = MemoryGraph::new();
        graph.upsert_offense(&theft()).await.unwrap();

        let related = graph.fetch_related("theft", HopRange::default()).await.unwrap();
        let infos: Vec<_> = related.iter().map(|r| r.info.clone()).collect();

        assert_eq!(
            infos,
            vec![
                "Chapter No.: 17".to_string(),
                "Section No.: 303".to_string(),
                "Imprisonment up to 3 years, or fine, or both".to_string(),
            ]
        );
        assert_eq!(related[0].labels, vec![CHAPTER_LABEL.to_string()]);
    }

    #[tokio::test]
    async fn two_hops_reach_offenses_sharing_a_chapter() {
        let graph = MemoryGraph::new();
        graph.upsert_offense(&theft()).await.unwrap();
        graph
            .upsert_offense(&OffenseTuple::new("Robbery", "17", "309", "10 years"))
            .await
            .unwrap();

        let one_hop = graph.fetch_related("Theft", HopRange::new(1, 1)).await.unwrap();
        assert!(!one_hop.iter().any(|r| r.info == "Robbery"));

        let two_hops = graph.fetch_related("Theft", HopRange::new(1, 2)).await.unwrap();
        assert!(two_hops.iter().any(|r| r.info == "Robbery"));
    }

    #[tokio::test]
    async fn matches_section_numbers_case_insensitively() {
        let graph = MemoryGraph::new();
        graph.upsert_offense(&theft()).await.unwrap();

        let related = graph
            .fetch_related("section no.: 303", HopRange::new(1, 1))
            .await
            .unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].info, "Theft");
    }

    #[tokio::test]
    async fn unknown_node_has_no_related_info() {
        let graph = MemoryGraph::new();
        graph.upsert_offense(&theft()).await.unwrap();

        let related = graph.fetch_related("Murder", HopRange::default()).await.unwrap();
        assert!(related.is_empty());
    }

    #[tokio::test]
    async fn blank_attributes_yield_empty_info() {
        let graph = MemoryGraph::new();
        let offense = graph.add_node(Node::new(OFFENSE_LABEL).with_name("Vagrancy"));
        let blank = graph.add_node(Node::new(PUNISHMENT_LABEL).with_description("   "));
        graph.add_edge(offense, HAS_PUNISHMENT, blank);

        let related = graph.fetch_related("Vagrancy", HopRange::default()).await.unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].info, "");
    }

    #[tokio::test]
    async fn empty_offense_name_is_rejected() {
        let graph = MemoryGraph::new();
        let err = graph
            .upsert_offense(&OffenseTuple::new(" ", "1", "1", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Graph(_)));
    }
}
