//! Original-content collaborators for gap expansion.
//!
//! Expansion needs the pre-change file body (base side of the diff).
//! Each source fetches the whole file once; callers slice out the span
//! they need. No caching here: a `DiffSet` session is short-lived and
//! repeated expansions of one file are rare.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ContentFetchError;

use super::client::gh_api_raw;

/// Supplier of original (pre-change) file content, split into lines.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Full original content of `file`, one entry per line, 1-indexed by
    /// position + 1. Empty content is an error: a gap exists, so the
    /// original cannot have been empty.
    async fn fetch_original(&self, file: &str) -> Result<Vec<String>, ContentFetchError>;

    /// Total line count of the original file, for trailing-gap EOF
    /// validation. Default fetches the whole body.
    async fn line_count(&self, file: &str) -> Result<u32, ContentFetchError> {
        Ok(self.fetch_original(file).await?.len() as u32)
    }
}

fn split_body(file: &str, body: &str) -> Result<Vec<String>, ContentFetchError> {
    if body.is_empty() {
        return Err(ContentFetchError::Empty(file.to_string()));
    }
    // A trailing newline is a line terminator, not an extra empty line.
    let body = body.strip_suffix('\n').unwrap_or(body);
    Ok(body.split('\n').map(|l| l.to_string()).collect())
}

/// Fetches file content at a fixed ref via `gh api` (raw media type).
/// The ref is the PR base sha, so the fetched body matches the old side
/// of every patch in the set.
pub struct GithubContentSource {
    repo: String,
    base_sha: String,
}

impl GithubContentSource {
    pub fn new(repo: impl Into<String>, base_sha: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            base_sha: base_sha.into(),
        }
    }
}

#[async_trait]
impl ContentSource for GithubContentSource {
    async fn fetch_original(&self, file: &str) -> Result<Vec<String>, ContentFetchError> {
        let endpoint = format!(
            "repos/{}/contents/{}?ref={}",
            self.repo, file, self.base_sha
        );
        let body = gh_api_raw(&endpoint).await.map_err(|e| {
            let message = e.to_string();
            if message.contains("Not Found") || message.contains("404") {
                ContentFetchError::NotFound(file.to_string())
            } else {
                ContentFetchError::Command(message)
            }
        })?;
        split_body(file, &body)
    }
}

/// Reads file content from the local repository via `git show REV:path`.
pub struct GitContentSource {
    rev: String,
}

impl GitContentSource {
    pub fn new(rev: impl Into<String>) -> Self {
        Self { rev: rev.into() }
    }
}

#[async_trait]
impl ContentSource for GitContentSource {
    async fn fetch_original(&self, file: &str) -> Result<Vec<String>, ContentFetchError> {
        let output = tokio::process::Command::new("git")
            .args(["show", &format!("{}:{}", self.rev, file)])
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("does not exist") || stderr.contains("exists on disk, but not in") {
                return Err(ContentFetchError::NotFound(file.to_string()));
            }
            return Err(ContentFetchError::Command(stderr.into_owned()));
        }

        let body = String::from_utf8_lossy(&output.stdout).into_owned();
        split_body(file, &body)
    }
}

/// In-memory source for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryContentSource {
    files: HashMap<String, Vec<String>>,
}

impl MemoryContentSource {
    pub fn insert(&mut self, file: impl Into<String>, lines: Vec<String>) {
        self.files.insert(file.into(), lines);
    }
}

#[async_trait]
impl ContentSource for MemoryContentSource {
    async fn fetch_original(&self, file: &str) -> Result<Vec<String>, ContentFetchError> {
        match self.files.get(file) {
            Some(lines) if lines.is_empty() => Err(ContentFetchError::Empty(file.to_string())),
            Some(lines) => Ok(lines.clone()),
            None => Err(ContentFetchError::NotFound(file.to_string())),
        }
    }
}
