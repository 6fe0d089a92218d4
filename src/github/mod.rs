mod client;
pub mod comment;
mod content;
mod pr;

pub use client::{gh_api, gh_api_post, gh_api_raw, gh_command, FieldValue};
pub use comment::{anchor_comment, create_review_comment, CommentAnchor, ReviewComment};
pub use content::{
    ContentSource, GitContentSource, GithubContentSource, MemoryContentSource,
};
pub use pr::{
    fetch_changed_files, fetch_pr, fetch_pr_diff, Branch, ChangedFile, PullRequest, User,
};
