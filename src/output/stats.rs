//! Run statistics
//!
//! Aggregate counts and timing for one pipeline run, plus a plain-text
//! report for the terminal.

use std::time::Duration;

/// Outcome counts for one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// URLs handed to the pipeline
    pub total: usize,

    /// Items that produced a record
    pub succeeded: usize,

    /// Items fetched but not matching the expected page shape
    pub skipped: usize,

    /// Items whose fetch failed after every retry
    pub failed: usize,

    /// Items never processed because the run was cancelled
    pub cancelled: usize,

    /// Extra fetch attempts across all items
    pub retries: u64,

    /// Size of the worker pool
    pub workers: usize,

    /// Wall-clock time from first enqueue to drain
    pub elapsed: Duration,

    /// SHA-256 of the configuration file the run used, if any
    pub config_hash: Option<String>,
}

impl RunStats {
    /// Items that reached a final outcome
    pub fn processed(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    /// Share of processed items that produced a record, in percent
    pub fn success_rate(&self) -> f64 {
        let processed = self.processed();
        if processed == 0 {
            0.0
        } else {
            (self.succeeded as f64 / processed as f64) * 100.0
        }
    }

    /// Hash of the configuration file, or a note that defaults were used
    pub fn config_source(&self) -> &str {
        self.config_hash.as_deref().unwrap_or("built-in defaults")
    }

    /// Processed items per second
    pub fn throughput(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.processed() as f64 / seconds
        } else {
            0.0
        }
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &RunStats) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  URLs: {}", stats.total);
    println!("  Workers: {}", stats.workers);
    println!("  Elapsed: {:.2}s", stats.elapsed.as_secs_f64());
    println!("  Throughput: {:.2} items/sec", stats.throughput());
    println!("  Config: {}", stats.config_source());
    println!();

    println!("Outcomes:");
    println!("  Parsed: {}", stats.succeeded);
    println!("  Page shape mismatch: {}", stats.skipped);
    println!("  Fetch failed: {}", stats.failed);
    if stats.cancelled > 0 {
        println!("  Cancelled: {}", stats.cancelled);
    }
    println!("  Retries: {}", stats.retries);
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} items parsed)",
        stats.success_rate(),
        stats.succeeded,
        stats.processed()
    );
}
