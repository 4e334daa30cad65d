//! Output module for console reporting.
//!
//! Provides:
//! - Colored console output
//! - Tracker stats and record reporting

pub mod console;
pub mod stats;

pub use console::{emit, print_error, print_info, print_success, print_warning, status_line, Status};
pub use stats::{print_check_results, print_record, print_tracker_stats};
