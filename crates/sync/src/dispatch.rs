use std::time::Duration;

use crate::document::ProjectDocumentSet;
use crate::target::SyncTarget;

#[derive(Debug, Clone)]
pub struct TargetOutcome {
    pub target_name: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub outcomes: Vec<TargetOutcome>,
    pub cancelled: bool,
}

impl SyncReport {
    pub fn all_succeeded(&self) -> bool {
        !self.cancelled && self.outcomes.iter().all(|o| o.error.is_none())
    }
}

/// Push one compiled document set to every target, serially. Per the
/// concurrency model: targets never run concurrently, a 1-second courtesy
/// delay separates each push, a failed target does not stop dispatch to the
/// rest, and cancellation is only checked at a target boundary so a target
/// already mid-push always finishes (no partial, rolled-back pushes).
pub async fn dispatch_sync(
    targets: &[Box<dyn SyncTarget>],
    set: &ProjectDocumentSet,
    courtesy_delay: Duration,
    should_cancel: &dyn Fn() -> bool,
) -> SyncReport {
    let mut report = SyncReport::default();

    for (index, target) in targets.iter().enumerate() {
        if should_cancel() {
            report.cancelled = true;
            break;
        }

        let error = match target.push(set).await {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!(target = target.name(), error = %err, "sync target push failed");
                Some(err.to_string())
            }
        };
        report.outcomes.push(TargetOutcome {
            target_name: target.name().to_string(),
            error,
        });

        if index + 1 < targets.len() {
            tokio::time::sleep(courtesy_delay).await;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SyncDocument;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    struct CountingTarget {
        name: String,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SyncTarget for CountingTarget {
        fn name(&self) -> &str {
            &self.name
        }

        async fn push(&self, _set: &ProjectDocumentSet) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("boom"));
            }
            Ok(())
        }
    }

    fn empty_set() -> ProjectDocumentSet {
        let project = Uuid::new_v4();
        ProjectDocumentSet {
            project_uuid: project,
            documents: Vec::new(),
            index: SyncDocument {
                id: project,
                collection: "index",
                title: "index".to_string(),
                body: String::new(),
                topics: Vec::new(),
            },
        }
    }

    #[tokio::test]
    async fn failed_target_does_not_stop_dispatch_to_the_rest() {
        let calls = Arc::new(AtomicUsize::new(0));
        let targets: Vec<Box<dyn SyncTarget>> = vec![
            Box::new(CountingTarget {
                name: "a".to_string(),
                fail: true,
                calls: calls.clone(),
            }),
            Box::new(CountingTarget {
                name: "b".to_string(),
                fail: false,
                calls: calls.clone(),
            }),
        ];

        let report = dispatch_sync(&targets, &empty_set(), Duration::from_millis(1), &|| false).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!report.all_succeeded());
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes[0].error.is_some());
        assert!(report.outcomes[1].error.is_none());
    }

    #[tokio::test]
    async fn cancelling_after_first_target_skips_the_rest() {
        let calls = Arc::new(AtomicUsize::new(0));
        let targets: Vec<Box<dyn SyncTarget>> = vec![
            Box::new(CountingTarget {
                name: "a".to_string(),
                fail: false,
                calls: calls.clone(),
            }),
            Box::new(CountingTarget {
                name: "b".to_string(),
                fail: false,
                calls: calls.clone(),
            }),
        ];

        let cancel_after_first = std::sync::atomic::AtomicBool::new(false);
        let should_cancel = || cancel_after_first.swap(true, Ordering::SeqCst);
        let report = dispatch_sync(&targets, &empty_set(), Duration::from_millis(1), &should_cancel).await;

        assert!(report.cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.outcomes.len(), 1);
    }
}
