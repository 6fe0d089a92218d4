//! Review-comment anchoring against diff positions.
//!
//! The single-comment API addresses a line by its `position` inside the
//! patch, not by file line number. Expansion-revealed lines were never
//! part of the patch and have no position; anchors on them are kept and
//! flagged for a file-level fallback instead of being dropped.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::gap::FileDiff;

use super::client::{gh_api_post, FieldValue};
use super::pr::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    pub path: String,
    pub position: Option<u32>,
    pub body: String,
    pub user: User,
    pub created_at: String,
}

/// Where a comment on a visible line can attach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentAnchor {
    pub path: String,
    /// New-side line number the comment targets.
    pub new_line: u32,
    /// Patch position, when the line is part of the original patch.
    pub diff_position: Option<u32>,
}

impl CommentAnchor {
    /// True when the API cannot place the comment on the line itself and
    /// the caller must fall back to a file-level comment.
    pub fn requires_file_fallback(&self) -> bool {
        self.diff_position.is_none()
    }
}

/// Resolve an anchor for a visible new-side line. `None` when the line is
/// not visible in the row stream at all (hidden in a gap or out of range).
pub fn anchor_comment(file: &FileDiff, new_line: u32) -> Option<CommentAnchor> {
    let line = file.line_at_new(new_line)?;
    Some(CommentAnchor {
        path: file.filename().to_string(),
        new_line,
        diff_position: line.diff_position,
    })
}

/// Create a position-addressed review comment.
///
/// line/side parameters are only valid inside a pull request review; the
/// standalone comment endpoint rejects them, so `position` it is.
pub async fn create_review_comment(
    repo: &str,
    pr_number: u32,
    commit_id: &str,
    anchor: &CommentAnchor,
    body: &str,
) -> Result<ReviewComment> {
    let position = anchor.diff_position.with_context(|| {
        format!(
            "no diff position for {}:{}; use a file-level comment",
            anchor.path, anchor.new_line
        )
    })?;
    let endpoint = format!("repos/{}/pulls/{}/comments", repo, pr_number);
    let position_str = position.to_string();
    let json = gh_api_post(
        &endpoint,
        &[
            ("body", FieldValue::String(body)),
            ("commit_id", FieldValue::String(commit_id)),
            ("path", FieldValue::String(&anchor.path)),
            ("position", FieldValue::Raw(&position_str)),
        ],
    )
    .await?;
    serde_json::from_value(json).context("Failed to parse created comment response")
}
