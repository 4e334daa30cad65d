//! Status lines for CLI outcomes.
//!
//! Informational and success lines go to stdout so scripts can capture
//! them; warnings and errors go to stderr alongside the tracing output.

use console::{style, StyledObject};

/// Outcome class of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Info,
    Ok,
    Warn,
    Error,
}

impl Status {
    /// Plain label text.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Info => "INFO",
            Status::Ok => "OK",
            Status::Warn => "WARN",
            Status::Error => "ERROR",
        }
    }

    /// Styled label for terminal output.
    pub fn label(self) -> StyledObject<&'static str> {
        let label = style(self.as_str()).bold();
        match self {
            Status::Info => label.cyan(),
            Status::Ok => label.green(),
            Status::Warn => label.yellow(),
            Status::Error => label.red(),
        }
    }

    fn to_stderr(self) -> bool {
        matches!(self, Status::Warn | Status::Error)
    }
}

/// Format a status line without writing it.
pub fn status_line(status: Status, message: &str) -> String {
    format!("{} {}", status.label(), message)
}

/// Write a status line to the stream matching its status.
pub fn emit(status: Status, message: &str) {
    let line = status_line(status, message);
    if status.to_stderr() {
        eprintln!("{}", line);
    } else {
        println!("{}", line);
    }
}

pub fn print_info(message: &str) {
    emit(Status::Info, message);
}

pub fn print_success(message: &str) {
    emit(Status::Ok, message);
}

pub fn print_warning(message: &str) {
    emit(Status::Warn, message);
}

pub fn print_error(message: &str) {
    emit(Status::Error, message);
}
