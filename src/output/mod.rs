//! Output module for run reporting
//!
//! This module handles:
//! - Aggregating per-item outcomes into run statistics
//! - Printing a summary once the pipeline has drained

pub mod stats;

pub use stats::{print_statistics, RunStats};
