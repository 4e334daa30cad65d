//! Per-operation failure policies.
//!
//! The tracker deliberately treats store failures differently depending on
//! the operation. Each operation names its policy here so the asymmetry is
//! explicit and cannot drift into one global strategy.

use std::fmt;

/// Tracker operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    IsProcessed,
    MarkProcessed,
    GetProcessInfo,
    CheckMultiple,
    Remove,
    Clear,
    Claim,
}

/// What an operation reports when the store fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePolicy {
    /// Behave as if no record exists, allowing the message through.
    FailOpen,
    /// Report failure to the caller as `false`, never as an error.
    ReportFailure,
    /// Report the record as absent.
    Absent,
    /// Report every id in the batch as unprocessed.
    AssumeUnprocessed,
    /// Return the store error to the caller.
    Propagate,
    /// Swallow the error and report `false`.
    Swallow,
}

impl Operation {
    /// The failure policy this operation applies.
    pub const fn failure_policy(self) -> FailurePolicy {
        match self {
            Operation::IsProcessed => FailurePolicy::FailOpen,
            Operation::MarkProcessed => FailurePolicy::ReportFailure,
            Operation::GetProcessInfo => FailurePolicy::Absent,
            Operation::CheckMultiple => FailurePolicy::AssumeUnprocessed,
            Operation::Remove => FailurePolicy::Propagate,
            Operation::Clear => FailurePolicy::Swallow,
            Operation::Claim => FailurePolicy::Propagate,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::IsProcessed => write!(f, "is_processed"),
            Operation::MarkProcessed => write!(f, "mark_processed"),
            Operation::GetProcessInfo => write!(f, "get_process_info"),
            Operation::CheckMultiple => write!(f, "check_multiple"),
            Operation::Remove => write!(f, "remove"),
            Operation::Clear => write!(f, "clear"),
            Operation::Claim => write!(f, "claim"),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::FailOpen => write!(f, "fail-open"),
            FailurePolicy::ReportFailure => write!(f, "report-failure"),
            FailurePolicy::Absent => write!(f, "absent"),
            FailurePolicy::AssumeUnprocessed => write!(f, "assume-unprocessed"),
            FailurePolicy::Propagate => write!(f, "propagate"),
            FailurePolicy::Swallow => write!(f, "swallow"),
        }
    }
}
