//! Typed errors for the gap expansion engine.
//!
//! Fetch-based operations are one-shot: no automatic retry. A failed
//! expansion leaves the targeted gap in its prior state so the caller may
//! re-invoke it manually.

use thiserror::Error;

/// Failure of the original-content collaborator.
///
/// Expansion and EOF validation need full pre-change file content; any of
/// these variants aborts the operation without partial data.
#[derive(Debug, Error)]
pub enum ContentFetchError {
    #[error("original content not found for {0}")]
    NotFound(String),
    /// The collaborator returned zero lines. Treated as a failure rather
    /// than an empty reveal so a half-fetched file can never splice.
    #[error("original content for {0} is empty")]
    Empty(String),
    #[error("content fetch command failed: {0}")]
    Command(String),
    /// Fetched content ends before the line range the diff declared.
    #[error("original content for {file} ends at line {actual}, expected {expected}")]
    Truncated {
        file: String,
        expected: u32,
        actual: u32,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by expansion operations.
///
/// Stale gap references and in-flight collisions are *not* errors; they
/// are reported as no-op outcomes (see `ExpandOutcome`).
#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("content fetch failed for {file}: {source}")]
    ContentFetch {
        file: String,
        #[source]
        source: ContentFetchError,
    },
    /// An EOF gap was asked to expand before its end was validated
    /// against the real file length.
    #[error("gap end is unresolved for {file}; validate the trailing gap first")]
    UnresolvedEnd { file: String },
}

/// A hunk header that does not match `@@ -old[,count] +new[,count] @@`.
///
/// The parser drops the offending hunk and keeps going; this type exists
/// so the drop site has a structured reason to log.
#[derive(Debug, Error)]
#[error("malformed hunk header: {0}")]
pub struct MalformedHunkHeader(pub String);
