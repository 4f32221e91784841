use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

/// Sink for the append-only audit event stream (spec §6). Registries accept
/// `Option<&dyn EventSink>` and emit best-effort — a failing sink must never
/// fail the mutation it's reporting on.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event_type: EventType, details: Value);
}

pub async fn emit(sink: Option<&dyn EventSink>, event_type: EventType, details: Value) {
    if let Some(sink) = sink {
        sink.emit(event_type, details).await;
    }
}

/// Closed catalogue of event types emitted on registry mutations (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    ConversationRegistered,
    DecisionInserted,
    DecisionUpdated,
    DecisionValidated,
    DecisionSuperseded,
    ThreadUpserted,
    ThreadResolved,
    LineageEdge,
    CompressionRegistered,
    FlagPlanted,
    FlagCompiled,
    PrimingUpserted,
    PrimingDeactivated,
    PatternStored,
    PatternMerged,
    PatternMatched,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventType::ConversationRegistered => "graph.conversation.registered",
            EventType::DecisionInserted => "graph.decision.inserted",
            EventType::DecisionUpdated => "graph.decision.updated",
            EventType::DecisionValidated => "graph.decision.validated",
            EventType::DecisionSuperseded => "graph.decision.superseded",
            EventType::ThreadUpserted => "graph.thread.upserted",
            EventType::ThreadResolved => "graph.thread.resolved",
            EventType::LineageEdge => "graph.lineage.edge",
            EventType::CompressionRegistered => "graph.compression.registered",
            EventType::FlagPlanted => "expedition.flag.planted",
            EventType::FlagCompiled => "expedition.flag.compiled",
            EventType::PrimingUpserted => "expedition.priming.upserted",
            EventType::PrimingDeactivated => "expedition.priming.deactivated",
            EventType::PatternStored => "memory.pattern.stored",
            EventType::PatternMerged => "memory.pattern.merged",
            EventType::PatternMatched => "memory.pattern.matched",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_documented_dotted_strings() {
        assert_eq!(EventType::DecisionInserted.to_string(), "graph.decision.inserted");
        assert_eq!(EventType::FlagPlanted.to_string(), "expedition.flag.planted");
    }
}
