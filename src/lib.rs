//! Diff gap computation and expansion for code-review tooling.
//!
//! Parses unified diffs with GitHub-compatible patch positions, models
//! the unchanged spans the diff omits as first-class gaps, and expands
//! them on demand from original file content while keeping old/new line
//! numbering consistent.

pub mod config;
pub mod diff;
pub mod error;
pub mod gap;
pub mod github;
pub mod loader;
