//! Command-line interface.

pub mod args;

pub use args::{into_metadata, parse_meta_pair, Args, BackendArg, Command};
