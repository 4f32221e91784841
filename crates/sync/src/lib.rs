//! Compiles registry state into documents and dispatches them to external
//! sync targets (spec's "Sync engine"): registry query, document compile,
//! per-target push with a rate-limited courtesy delay.

pub mod dispatch;
pub mod document;
pub mod target;

pub use dispatch::{dispatch_sync, SyncReport, TargetOutcome};
pub use document::{compile_project_documents, ProjectDocumentSet, SyncDocument};
pub use target::{ObsidianVaultTarget, SyncTarget};
