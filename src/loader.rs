//! Assembly of a [`DiffSet`] from a PR, a local revision, or a diff file.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::diff;
use crate::gap::{expand::apply_trailing_validation, DiffSet, FileDiff};
use crate::github::{self, ContentSource, PullRequest};

/// Fetch a PR's metadata and per-file patches, then compute gaps.
pub async fn load_pr(repo: &str, pr_number: u32) -> Result<(PullRequest, DiffSet)> {
    let (pr, mut files) = tokio::try_join!(
        github::fetch_pr(repo, pr_number),
        github::fetch_changed_files(repo, pr_number)
    )?;

    // The files API omits `patch` for large files; recover those from the
    // full PR diff.
    if files.iter().any(|f| f.patch.is_none()) {
        match github::fetch_pr_diff(repo, pr_number).await {
            Ok(full_diff) => {
                let mut patch_map = diff::split_unified_diff(&full_diff);
                for file in files.iter_mut() {
                    if file.patch.is_none() {
                        file.patch = patch_map.remove(&file.filename);
                    }
                }
            }
            Err(e) => {
                warn!("Failed to fetch full diff for fallback: {}", e);
            }
        }
    }

    let mut set = DiffSet::default();
    for file in files {
        match file.patch {
            Some(patch) => set.insert(FileDiff::from_patch(&file.filename, &patch)),
            None => {
                // Binary or otherwise patchless; nothing to expand.
                debug!(file = %file.filename, "no patch available, skipping");
            }
        }
    }
    Ok((pr, set))
}

/// Parse a unified diff file on disk into a `DiffSet`.
pub async fn load_diff_file(path: &Path) -> Result<DiffSet> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read diff file {}", path.display()))?;
    Ok(diff_set_from_text(&content))
}

/// Run `git diff <rev>` in `working_dir` and compute gaps from the output.
pub async fn load_local_diff(rev: &str, working_dir: Option<&str>) -> Result<DiffSet> {
    let mut command = Command::new("git");
    // Disable C-quoting of non-ASCII paths to get raw UTF-8 output
    command.args(["-c", "core.quotePath=false", "diff", rev]);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    let output = command
        .output()
        .await
        .context("failed to spawn git diff command")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git diff {} failed: {}", rev, stderr.trim());
    }

    Ok(diff_set_from_text(&String::from_utf8_lossy(&output.stdout)))
}

fn diff_set_from_text(text: &str) -> DiffSet {
    let patches: HashMap<String, String> = diff::split_unified_diff(text);
    DiffSet::from_patches(patches)
}

/// Resolve every unvalidated trailing gap in the set against the real
/// file lengths. The per-file line-count fetches are independent, so
/// they fan out; results apply sequentially. A failed fetch leaves that
/// file's gap unvalidated for a later retry.
pub async fn validate_trailing_gaps(set: &mut DiffSet, source: Arc<dyn ContentSource>) {
    let mut pending = JoinSet::new();
    for file in set.files() {
        if file.unvalidated_trailing_gap().is_none() {
            continue;
        }
        let filename = file.filename().to_string();
        let source = Arc::clone(&source);
        pending.spawn(async move {
            let count = source.line_count(&filename).await;
            (filename, count)
        });
    }

    while let Some(joined) = pending.join_next().await {
        let Ok((filename, count)) = joined else {
            continue;
        };
        let total = match count {
            Ok(total) => total,
            Err(e) => {
                warn!(file = %filename, error = %e, "EOF validation fetch failed");
                continue;
            }
        };
        if let Some(file) = set.get_mut(&filename) {
            if let Some(gap) = file.unvalidated_trailing_gap() {
                let id = gap.id;
                let old_start = gap.old_start;
                apply_trailing_validation(file, id, old_start, total);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gap::GapEnd;
    use crate::github::MemoryContentSource;
    use std::path::Path;
    use std::process::Command;
    use tempfile::tempdir;

    const DIFF: &str = "\
diff --git a/src/a.js b/src/a.js
index 1234567..abcdefg 100644
--- a/src/a.js
+++ b/src/a.js
@@ -10,3 +10,4 @@
 ctx
+added
 ctx
 ctx
diff --git a/src/b.js b/src/b.js
index 2345678..bcdefgh 100644
--- a/src/b.js
+++ b/src/b.js
@@ -1,2 +1,2 @@
 one
-two
+TWO
";

    #[tokio::test]
    async fn diff_file_loads_every_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("change.diff");
        std::fs::write(&path, DIFF).unwrap();

        let set = load_diff_file(&path).await.unwrap();
        assert_eq!(set.len(), 2);
        let a = set.get("src/a.js").unwrap();
        // Leading gap [1, 9] plus an unvalidated trailing gap.
        assert_eq!(a.gaps().count(), 2);
        assert!(a.unvalidated_trailing_gap().is_some());
    }

    #[tokio::test]
    async fn missing_diff_file_is_an_error() {
        let err = load_diff_file(Path::new("/nonexistent/x.diff"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("x.diff"));
    }

    #[tokio::test]
    async fn trailing_gaps_validate_across_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("change.diff");
        std::fs::write(&path, DIFF).unwrap();
        let mut set = load_diff_file(&path).await.unwrap();

        let mut source = MemoryContentSource::default();
        source.insert(
            "src/a.js",
            (1..=30).map(|i| format!("a {}", i)).collect::<Vec<_>>(),
        );
        // b.js ends where the diff ends: its trailing gap must retire.
        source.insert("src/b.js", vec!["one".to_string(), "two".to_string()]);
        validate_trailing_gaps(&mut set, Arc::new(source)).await;

        let a = set.get("src/a.js").unwrap();
        assert!(a.unvalidated_trailing_gap().is_none());
        assert!(a.gaps().any(|g| g.old_end == GapEnd::Known(30)));

        let b = set.get("src/b.js").unwrap();
        assert!(b.unvalidated_trailing_gap().is_none());
        assert_eq!(b.gaps().count(), 0);
    }

    #[tokio::test]
    async fn failed_validation_leaves_gap_pending() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("change.diff");
        std::fs::write(&path, DIFF).unwrap();
        let mut set = load_diff_file(&path).await.unwrap();

        // Source knows neither file.
        validate_trailing_gaps(&mut set, Arc::new(MemoryContentSource::default())).await;
        assert!(set.get("src/a.js").unwrap().unvalidated_trailing_gap().is_some());
        assert!(set.get("src/b.js").unwrap().unvalidated_trailing_gap().is_some());
    }

    fn run_git(dir: &Path, args: &[&str], message: &str) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "gapfold-test")
            .env("GIT_AUTHOR_EMAIL", "gapfold-test@example.com")
            .env("GIT_COMMITTER_NAME", "gapfold-test")
            .env("GIT_COMMITTER_EMAIL", "gapfold-test@example.com")
            .status()
            .expect(message);
        assert!(status.success(), "{message}: {status}");
    }

    #[tokio::test]
    async fn local_diff_computes_gaps_from_git() {
        let tempdir = tempdir().unwrap();
        let workdir = tempdir.path();

        run_git(workdir, &["init", "-b", "main"], "failed to init repo");
        let body: String = (1..=30).map(|i| format!("line {}\n", i)).collect();
        std::fs::write(workdir.join("file.txt"), &body).unwrap();
        run_git(workdir, &["add", "file.txt"], "failed to add file");
        run_git(workdir, &["commit", "-m", "initial"], "failed to commit");

        // Change line 15 only.
        let changed = body.replace("line 15\n", "line fifteen\n");
        std::fs::write(workdir.join("file.txt"), changed).unwrap();

        let set = load_local_diff("HEAD", Some(&workdir.to_string_lossy()))
            .await
            .unwrap();
        let file = set.get("file.txt").unwrap();
        // A gap above the hunk and one below it.
        assert!(file.gaps().count() >= 2);
        assert!(file.line_at_new(15).is_some());
        assert!(file.line_at_new(5).is_none());
    }
}
