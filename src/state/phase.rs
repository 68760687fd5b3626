//! Pipeline-level phase tracking
//!
//! A crawl moves through `CollectingLinks → DistributingWork → Draining → Complete`.
//! The current phase is published on a watch channel so callers can observe
//! progress without polling shared state.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Phase of a whole crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelinePhase {
    /// Discovering article URLs (or loading them from the cache)
    CollectingLinks,

    /// The producer is enqueueing URLs while workers consume them
    DistributingWork,

    /// All URLs are enqueued; waiting for the last items to be acknowledged
    Draining,

    /// Every item has been acknowledged
    Complete,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CollectingLinks => "collecting_links",
            Self::DistributingWork => "distributing_work",
            Self::Draining => "draining",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared publisher of the current [`PipelinePhase`]
///
/// Cloning yields another handle to the same channel.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    sender: Arc<watch::Sender<PipelinePhase>>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new(PipelinePhase::CollectingLinks)
    }
}

impl PhaseTracker {
    pub fn new(initial: PipelinePhase) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publishes a new phase; a no-op if it is already current
    pub fn set(&self, phase: PipelinePhase) {
        let previous = self.sender.send_replace(phase);
        if previous != phase {
            tracing::info!(from = %previous, to = %phase, "Pipeline phase changed");
        }
    }

    pub fn current(&self) -> PipelinePhase {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelinePhase> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert!(PipelinePhase::CollectingLinks < PipelinePhase::DistributingWork);
        assert!(PipelinePhase::DistributingWork < PipelinePhase::Draining);
        assert!(PipelinePhase::Draining < PipelinePhase::Complete);
    }

    #[test]
    fn test_set_without_subscribers() {
        let tracker = PhaseTracker::default();
        tracker.set(PipelinePhase::Draining);
        assert_eq!(tracker.current(), PipelinePhase::Draining);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let tracker = PhaseTracker::default();
        let mut receiver = tracker.subscribe();

        let clone = tracker.clone();
        clone.set(PipelinePhase::Complete);

        receiver.changed().await.unwrap();
        assert_eq!(*receiver.borrow(), PipelinePhase::Complete);
    }

    #[test]
    fn test_display() {
        assert_eq!(PipelinePhase::DistributingWork.to_string(), "distributing_work");
    }
}
