use std::sync::Arc;

use tracing::debug;

use crate::analysis::graph_db::GraphStore;
use crate::analysis::models::HopRange;
use crate::Result;

/// Builds the textual context for a matched node from its neighbourhood.
pub struct ContextAssembler {
    graph: Arc<dyn GraphStore>,
    hops: HopRange,
}

impl ContextAssembler {
    pub fn new(graph: Arc<dyn GraphStore>, hops: HopRange) -> Self {
        Self { graph, hops }
    }

    /// Newline-joined info of every related node, in traversal order.
    ///
    /// Returns a sentinel line instead of an empty document when nothing
    /// is related, or when nothing related carries text.
    pub async fn get_context(&self, node_name: &str) -> Result<String> {
        let related = self.graph.fetch_related(node_name, self.hops).await?;
        if related.is_empty() {
            return Ok(no_context(node_name));
        }

        let lines: Vec<&str> = related
            .iter()
            .map(|r| r.info.as_str())
            .filter(|info| !info.trim().is_empty())
            .collect();

        if lines.is_empty() {
            return Ok(no_usable_info(node_name));
        }

        debug!(
            "Context for {}: {} of {} related nodes usable",
            node_name,
            lines.len(),
            related.len()
        );
        Ok(lines.join("\n"))
    }
}

pub fn no_context(node_name: &str) -> String {
    format!("No context found for: {node_name}")
}

pub fn no_usable_info(node_name: &str) -> String {
    format!("No usable info for: {node_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::memory_graph::{MemoryGraph, Node};
    use crate::analysis::models::{OffenseTuple, HAS_PUNISHMENT, OFFENSE_LABEL, PUNISHMENT_LABEL};

    #[tokio::test]
    async fn joins_related_info_in_order() {
        let graph = Arc::new(MemoryGraph::new());
        graph
            .upsert_offense(&OffenseTuple::new("Theft", "17", "303", "Up to 3 years"))
            .await
            .unwrap();

        let assembler = ContextAssembler::new(graph, HopRange::default());
        let context = assembler.get_context("Theft").await.unwrap();

        assert_eq!(context, "Chapter No.: 17\nSection No.: 303\nUp to 3 years");
    }

    #[tokio::test]
    async fn unknown_node_gets_no_context_sentinel() {
        let assembler = ContextAssembler::new(Arc::new(MemoryGraph::new()), HopRange::default());
        let context = assembler.get_context("Murder").await.unwrap();
        assert_eq!(context, "No context found for: Murder");
    }

    #[tokio::test]
    async fn blank_neighbours_get_no_usable_info_sentinel() {
        let graph = MemoryGraph::new();
        let offense = graph.add_node(Node::new(OFFENSE_LABEL).with_name("Vagrancy"));
        let punishment = graph.add_node(Node::new(PUNISHMENT_LABEL).with_description(" "));
        graph.add_edge(offense, HAS_PUNISHMENT, punishment);

        let assembler = ContextAssembler::new(Arc::new(graph), HopRange::default());
        let context = assembler.get_context("Vagrancy").await.unwrap();

        assert_eq!(context, "No usable info for: Vagrancy");
    }
}
