//! kbsearch-vector
//!
//! Vector indexes answering top-N inner-product queries: a LanceDB-backed
//! table for serving and an exact in-memory index.

pub mod flat;
pub mod schema;
pub mod search;
pub mod table;

pub use flat::FlatIndex;
pub use search::LanceVectorIndex;
