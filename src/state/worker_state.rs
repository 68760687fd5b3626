/// Worker state definitions for tracking item processing
///
/// Every worker cycles through these states once per work item:
/// `Idle → Fetching → (Retrying)* → Parsing → RecordingSuccess | RecordingSkip → Idle`,
/// and ends in `Done` when the queue is drained.
use std::fmt;

/// Represents what a pipeline worker is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    // ===== Waiting =====
    /// Waiting for the next item
    Idle,

    // ===== Network =====
    /// First attempt of the fetch is in progress
    Fetching,

    /// A previous attempt failed and another one is in progress
    Retrying,

    // ===== Processing =====
    /// Page content is being turned into a record
    Parsing,

    /// A record is being added to the results
    RecordingSuccess,

    /// The item is being recorded as skipped (fetch exhausted or page mismatch)
    RecordingSkip,

    // ===== Terminal =====
    /// The queue is drained; the worker has exited
    Done,
}

impl WorkerState {
    /// Returns true if the worker has exited
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if the state involves waiting on the network
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Fetching | Self::Retrying)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: WorkerState) -> bool {
        use WorkerState::*;

        matches!(
            (self, next),
            (Idle, Fetching)
                | (Idle, Done)
                | (Fetching, Retrying)
                | (Fetching, Parsing)
                | (Fetching, RecordingSkip)
                | (Retrying, Retrying)
                | (Retrying, Parsing)
                | (Retrying, RecordingSkip)
                | (Parsing, RecordingSuccess)
                | (Parsing, RecordingSkip)
                | (RecordingSuccess, Idle)
                | (RecordingSkip, Idle)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Retrying => "retrying",
            Self::Parsing => "parsing",
            Self::RecordingSuccess => "recording_success",
            Self::RecordingSkip => "recording_skip",
            Self::Done => "done",
        }
    }

    /// Returns all possible worker states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Idle,
            Self::Fetching,
            Self::Retrying,
            Self::Parsing,
            Self::RecordingSuccess,
            Self::RecordingSkip,
            Self::Done,
        ]
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
