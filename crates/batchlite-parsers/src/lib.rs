//! Shared utilities for talking to batch-system command-line tools.
//!
//! This crate provides the process invoker used by every scheduler backend
//! together with small helpers for the text those tools print.

pub mod command;
pub mod fragment;

pub use command::{CommandError, CommandOutput, CommandRunner, SystemRunner, command_line, run_command};
pub use fragment::{extract_between, extract_tag};

/// Filter helper for optional string values.
/// Returns None if the string is empty after trimming.
pub fn non_empty_string(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split a comma-separated list, trimming entries and dropping blank ones.
pub fn split_list(s: &str) -> Vec<&str> {
    s.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect()
}
