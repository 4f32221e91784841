//! The recall heart: attention-weighted scoring over a multi-collection
//! vector search, entanglement enrichment, and budget-constrained context
//! composition.

pub mod collections;
pub mod context;
pub mod recall;
pub mod scoring;

pub use collections::Category;
pub use context::{context_load, project_context, ContextLoad, ProjectContext};
pub use recall::{recall, recall_with_embedding, RecallHit, RecallResult, DEFAULT_BUDGET, DEFAULT_MIN_SCORE};
pub use scoring::{attention, freshness};
