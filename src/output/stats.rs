//! Reporting of tracker state.

use std::collections::HashMap;

use console::style;

use crate::dedup::{ProcessingRecord, TrackerStats};

/// Print the tracker configuration.
pub fn print_tracker_stats(stats: &TrackerStats) {
    println!();
    println!("{}", style("Tracker:").bold());
    println!("  Key prefix:   {}", stats.key_prefix);
    println!("  TTL:          {}s", stats.ttl_seconds);
    println!("  Retry window: {}ms", stats.retry_window_ms);
    println!("  Expiry:       {}", stats.expiry);
    println!();
}

/// Print batch check results in input order.
pub fn print_check_results(ids: &[String], results: &HashMap<String, bool>) {
    for id in ids {
        let label = if results.get(id).copied().unwrap_or(false) {
            style("processed").green()
        } else {
            style("not processed").yellow()
        };
        println!("  {:<40} {}", id, label);
    }
}

/// Print a stored record as pretty JSON.
pub fn print_record(record: &ProcessingRecord) {
    match serde_json::to_string_pretty(record) {
        Ok(json) => println!("{}", json),
        Err(e) => println!("{} {}", style("unprintable record:").red(), e),
    }
}
