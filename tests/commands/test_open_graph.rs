use std::collections::BTreeSet;
use std::time::Duration;

use legal_graph_rag::analysis::{GraphStore, HopRange, NodeScope, OffenseTuple};
use legal_graph_rag::commands::{open_graph, retry_policy};
use legal_graph_rag::config::Config;
use legal_graph_rag::graphrag::tuple_file;

fn offline_config() -> Config {
    Config::from_yaml_str(
        r#"
embeddings:
  provider: local
  dimension: 64
extraction:
  max_attempts: 5
  backoff_ms: 250
"#,
    )
    .unwrap()
}

#[tokio::test]
async fn test_offline_graph_is_loaded_from_tuple_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tuples.json");
    let tuples: BTreeSet<_> = [
        OffenseTuple::new("Theft", "17", "303", "3 years"),
        OffenseTuple::new("Murder", "6", "103", "Death"),
    ]
    .into_iter()
    .collect();
    tuple_file::save(&path, &tuples).unwrap();

    let graph = open_graph(&offline_config(), Some(&path)).await.unwrap();

    assert_eq!(graph.count_offenses().await.unwrap(), 2);
    let names = graph.fetch_all_node_names(NodeScope::Offenses).await.unwrap();
    assert!(names.contains(&"Theft".to_string()));

    let related = graph
        .fetch_related("Murder", HopRange::new(1, 1))
        .await
        .unwrap();
    assert_eq!(related.len(), 3);
}

#[tokio::test]
async fn test_offline_graph_with_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let graph = open_graph(&offline_config(), Some(&dir.path().join("none.json")))
        .await
        .unwrap();

    assert_eq!(graph.count_offenses().await.unwrap(), 0);
}

#[test]
fn test_retry_policy_follows_extraction_config() {
    let policy = retry_policy(&offline_config().extraction);
    assert_eq!(policy.max_attempts, 5);
    assert_eq!(policy.backoff, Duration::from_millis(250));
}
