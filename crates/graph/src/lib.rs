//! The knowledge-graph registries: projects, conversations, decisions,
//! threads, priming blocks, expedition flags, compression tags, lineage
//! edges, display-id allocation, and the decision conflict detector.

pub mod compression;
pub mod conflict;
pub mod conversation;
pub mod decision;
pub mod display_id;
pub mod embed;
pub mod event_types;
pub mod flag;
pub mod lineage;
pub mod priming;
pub mod project;
pub mod role;
pub mod schema;
pub mod storeio;
pub mod thread;

pub use embed::{EmbedClient, EMBEDDING_DIM};
pub use event_types::{EventSink, EventType};
pub use schema::*;
