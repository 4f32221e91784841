//! Secondary memory: the append-only audit event log, a retention-policied
//! archive for retired registry records, a TTL key-value scratchpad, and a
//! self-merging pattern store.

pub mod archive;
pub mod event_log;
pub mod pattern;
pub mod scratchpad;

pub use archive::{archive, list_archived, ArchivedEntry};
pub use event_log::{EventRecord, StoreEventLog};
pub use pattern::{match_patterns, store_pattern, PatternRecord, PatternUpsertAction, PatternUpsertResult};
