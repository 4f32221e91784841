pub mod document;
pub mod error;
pub mod filter;
#[cfg(feature = "redb-index")]
pub mod index;
pub mod memory_store;
pub mod vector;

pub use document::Document;
pub use error::StoreError;
pub use filter::Filter;
#[cfg(feature = "redb-index")]
pub use index::{IndexCacheStats, SecondaryIndex};
pub use memory_store::{InMemoryStore, Store};
pub use vector::{cosine_similarity, VectorHit, VectorSearchOptions};
