//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `WorkerState`: What an individual pipeline worker is doing
//! - `PipelinePhase`: Where the crawl run as a whole stands
//! - `PhaseTracker`: Publishes phase changes on a watch channel

mod phase;
mod worker_state;

// Re-export main types
pub use phase::{PhaseTracker, PipelinePhase};
pub use worker_state::WorkerState;
