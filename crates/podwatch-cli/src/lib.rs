//! podwatch CLI
//!
//! Argument parsing and terminal formatting for the `podwatch` binary.

pub mod config;
pub mod display;

pub use config::{Command, Config, version_info};
