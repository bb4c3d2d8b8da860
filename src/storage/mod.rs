//! Persistence layer (4.A): per-file records, the path list, the last-
//! scanned revision, the unit-ID table, and the sparse call graphs.

pub mod graph;
pub mod persistence;

pub use graph::{BoundedSearch, GraphPair, SparseGraph};
pub use persistence::{IdTable, Store};
