//! Source indexer (4.D) and call-graph builder (4.E).

pub mod graph_builder;
pub mod indexer;
pub mod walker;

pub use graph_builder::build_call_graph;
pub use indexer::Indexer;
pub use walker::discover_files;
