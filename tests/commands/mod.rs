//! Command helper tests (no network, no Neo4j).

mod test_open_graph;
