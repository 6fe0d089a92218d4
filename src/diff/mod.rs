//! Unified diff intake.
//!
//! Splits a multi-file `git diff` / `gh pr diff` payload into per-file
//! patch text and classifies raw patch lines. The structured parser that
//! turns one file's patch into hunks lives in [`parser`].

mod parser;

pub use parser::{
    parse_file_patch, DiffLine, Hunk, LineKind, ParsedPatch, Side,
};

use std::collections::HashMap;
use tracing::warn;

/// Raw classification of one line of unified-diff text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchLineKind {
    /// `@@ ... @@` hunk header
    Header,
    /// `diff --git`, `index`, `---`, `+++` and friends
    Meta,
    /// Added in the new version (`+` prefix)
    Insert,
    /// Removed from the old version (`-` prefix)
    Delete,
    /// Unchanged (space prefix)
    Context,
}

/// Classify a raw patch line and strip its prefix.
pub fn classify_line(line: &str) -> (PatchLineKind, &str) {
    if line.starts_with("@@") {
        (PatchLineKind::Header, line)
    } else if line.starts_with("+++")
        || line.starts_with("---")
        || line.starts_with("diff ")
        || line.starts_with("index ")
        || line.starts_with("new file mode ")
        || line.starts_with("deleted file mode ")
        || line.starts_with("similarity index ")
        || line.starts_with("rename from ")
        || line.starts_with("rename to ")
        || line.starts_with("Binary files ")
        || line.starts_with("\\ No newline")
    {
        (PatchLineKind::Meta, line)
    } else if let Some(content) = line.strip_prefix('+') {
        (PatchLineKind::Insert, content)
    } else if let Some(content) = line.strip_prefix('-') {
        (PatchLineKind::Delete, content)
    } else if let Some(content) = line.strip_prefix(' ') {
        (PatchLineKind::Context, content)
    } else {
        // Tolerate prefix-less lines (trailing empty line in some diffs)
        (PatchLineKind::Context, line)
    }
}

/// Split a multi-file unified diff into `filename -> patch text`.
///
/// Filenames are normalized without the `a/` / `b/` prefixes and use the
/// new-side name for renames, matching the GitHub API's
/// `ChangedFile.filename`. When the `diff --git` line is ambiguous
/// (spaces in paths), the `+++` / `---` lines decide.
pub fn split_unified_diff(unified_diff: &str) -> HashMap<String, String> {
    let lines: Vec<&str> = unified_diff.lines().collect();
    let mut result = HashMap::new();
    let mut current_filename: Option<String> = None;
    let mut current_start: Option<usize> = None;
    let mut pending_old_name: Option<String> = None;

    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("diff --git ") {
            if let (Some(filename), Some(start)) = (current_filename.take(), current_start) {
                let patch = lines[start..i].join("\n");
                if !patch.is_empty() {
                    result.insert(filename, patch);
                }
            }
            current_filename = filename_from_diff_line(line);
            current_start = Some(i);
            pending_old_name = None;
        } else if current_filename.is_none() && current_start.is_some() {
            // Ambiguous diff --git line; decide from +++ (preferred) or
            // --- (deleted-file fallback where +++ is /dev/null).
            if let Some(rest) = line.strip_prefix("+++ ") {
                if rest != "/dev/null" {
                    current_filename = Some(strip_side_prefix(rest));
                } else if let Some(old) = pending_old_name.take() {
                    current_filename = Some(old);
                }
            } else if let Some(rest) = line.strip_prefix("--- ") {
                if rest != "/dev/null" {
                    pending_old_name = Some(strip_side_prefix(rest));
                }
            }
        }
    }

    if let (Some(filename), Some(start)) = (current_filename, current_start) {
        let patch = lines[start..].join("\n");
        if !patch.is_empty() {
            result.insert(filename, patch);
        }
    }

    if result.is_empty() && !unified_diff.trim().is_empty() {
        warn!("no 'diff --git' headers found; plain unified diff input is not split");
    }

    result
}

/// Strip the single-char side prefix (`a/`, `b/`, `w/`, ...) from a
/// `---`/`+++` path.
fn strip_side_prefix(path: &str) -> String {
    if path.len() >= 2 && path.as_bytes()[1] == b'/' {
        path[2..].to_string()
    } else {
        path.to_string()
    }
}

/// Extract the new-side filename from a `diff --git X/old Y/new` line.
///
/// Handles standard (`a/`..`b/`) and mnemonic (`c/`/`i/`/`o/`..`w/`)
/// prefixes, and paths containing spaces. Returns `None` when the line is
/// ambiguous; the caller falls back to the `+++` line.
fn filename_from_diff_line(line: &str) -> Option<String> {
    let content = line.strip_prefix("diff --git ")?;
    if content.len() < 2 || content.as_bytes()[1] != b'/' {
        warn!("unparsable diff --git line: {}", line);
        return None;
    }

    let first_prefix = content.as_bytes()[0];
    let rest = &content[2..];

    // Non-rename case: "path SEP path" with equal halves. The separator
    // is " Y/" so total length is 2 * len + 3.
    if rest.len() >= 3 && (rest.len() - 3) % 2 == 0 {
        let half = (rest.len() - 3) / 2;
        if half > 0 {
            let bytes = rest.as_bytes();
            if bytes[half] == b' ' && bytes[half + 2] == b'/' && rest[..half] == rest[half + 3..] {
                return Some(rest[half + 3..].to_string());
            }
        }
    }

    // Rename: look for a single unambiguous " Y/" separator, where Y is
    // the known partner of the first prefix char.
    let second_prefix = match first_prefix {
        b'a' => b'b',
        b'c' | b'i' | b'o' => b'w',
        _ => {
            warn!("unknown diff prefix in: {}", line);
            return None;
        }
    };

    let bytes = rest.as_bytes();
    let mut separators = Vec::new();
    for i in 0..bytes.len().saturating_sub(2) {
        if bytes[i] == b' ' && bytes[i + 1] == second_prefix && bytes[i + 2] == b'/' {
            separators.push(i);
        }
    }

    match separators.as_slice() {
        [sep] if rest.len() > sep + 3 => Some(rest[sep + 3..].to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use std::collections::BTreeMap;

    fn render(result: &HashMap<String, String>) -> String {
        let sorted: BTreeMap<&str, &str> = result
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        sorted
            .iter()
            .map(|(name, patch)| format!("[{}]\n{}", name, patch))
            .collect::<Vec<_>>()
            .join("\n---\n")
    }

    #[test]
    fn classify_basic_kinds() {
        assert_eq!(classify_line("@@ -1,2 +1,3 @@").0, PatchLineKind::Header);
        assert_eq!(classify_line("diff --git a/x b/x").0, PatchLineKind::Meta);
        assert_eq!(classify_line("+added"), (PatchLineKind::Insert, "added"));
        assert_eq!(classify_line("-removed"), (PatchLineKind::Delete, "removed"));
        assert_eq!(classify_line(" same"), (PatchLineKind::Context, "same"));
        // No prefix falls back to context
        assert_eq!(classify_line("").0, PatchLineKind::Context);
    }

    #[test]
    fn classify_no_newline_marker_is_meta() {
        assert_eq!(
            classify_line("\\ No newline at end of file").0,
            PatchLineKind::Meta
        );
    }

    #[test]
    fn filename_standard_and_nested() {
        assert_eq!(
            filename_from_diff_line("diff --git a/src/foo.rs b/src/foo.rs"),
            Some("src/foo.rs".to_string())
        );
        assert_eq!(
            filename_from_diff_line("diff --git a/deep/nested/f.rs b/deep/nested/f.rs"),
            Some("deep/nested/f.rs".to_string())
        );
    }

    #[test]
    fn filename_rename_uses_new_side() {
        assert_eq!(
            filename_from_diff_line("diff --git a/src/old.rs b/src/new.rs"),
            Some("src/new.rs".to_string())
        );
    }

    #[test]
    fn filename_mnemonic_prefixes() {
        assert_eq!(
            filename_from_diff_line("diff --git c/src/foo.rs w/src/foo.rs"),
            Some("src/foo.rs".to_string())
        );
        assert_eq!(
            filename_from_diff_line("diff --git i/bar.rs w/bar.rs"),
            Some("bar.rs".to_string())
        );
    }

    #[test]
    fn filename_with_spaces() {
        assert_eq!(
            filename_from_diff_line("diff --git a/my dir/file.rs b/my dir/file.rs"),
            Some("my dir/file.rs".to_string())
        );
    }

    #[test]
    fn filename_ambiguous_returns_none() {
        // Both sides contain " b/", undecidable from this line alone
        assert_eq!(
            filename_from_diff_line("diff --git a/x b/old.rs b/x b/new.rs"),
            None
        );
        assert_eq!(filename_from_diff_line("not a diff line"), None);
    }

    #[test]
    fn split_single_file() {
        let diff = "diff --git a/src/main.rs b/src/main.rs\n\
                    index 1234567..abcdefg 100644\n\
                    --- a/src/main.rs\n\
                    +++ b/src/main.rs\n\
                    @@ -1,3 +1,4 @@\n \
                    fn main() {\n\
                    +    println!(\"hi\");\n \
                    }";
        let result = split_unified_diff(diff);
        assert_snapshot!(render(&result), @r#"
        [src/main.rs]
        diff --git a/src/main.rs b/src/main.rs
        index 1234567..abcdefg 100644
        --- a/src/main.rs
        +++ b/src/main.rs
        @@ -1,3 +1,4 @@
         fn main() {
        +    println!("hi");
         }
        "#);
    }

    #[test]
    fn split_multiple_files() {
        let diff = "diff --git a/a.rs b/a.rs\n\
                    --- a/a.rs\n\
                    +++ b/a.rs\n\
                    @@ -1,1 +1,2 @@\n \
                    one\n\
                    +two\n\
                    diff --git a/b.rs b/b.rs\n\
                    --- a/b.rs\n\
                    +++ b/b.rs\n\
                    @@ -5,1 +6,1 @@\n\
                    -five\n\
                    +cinq";
        let result = split_unified_diff(diff);
        assert_eq!(result.len(), 2);
        assert!(result["a.rs"].contains("+two"));
        assert!(result["b.rs"].contains("+cinq"));
    }

    #[test]
    fn split_deleted_file_uses_old_name() {
        let diff = "diff --git a/x b/gone.rs b/x b/gone.rs\n\
                    deleted file mode 100644\n\
                    --- a/x b/gone.rs\n\
                    +++ /dev/null\n\
                    @@ -1,1 +0,0 @@\n\
                    -bye";
        let result = split_unified_diff(diff);
        assert!(result.contains_key("x b/gone.rs"));
    }

    #[test]
    fn split_ambiguous_falls_back_to_plus_line() {
        let diff = "diff --git a/x b/old.rs b/x b/new.rs\n\
                    index 1234567..abcdefg 100644\n\
                    --- a/x b/old.rs\n\
                    +++ b/x b/new.rs\n\
                    @@ -1,1 +1,1 @@\n\
                    -old\n\
                    +new";
        let result = split_unified_diff(diff);
        assert!(result.contains_key("x b/new.rs"));
    }

    #[test]
    fn split_empty_input() {
        assert!(split_unified_diff("").is_empty());
    }

    #[test]
    fn split_without_git_headers_yields_empty_map() {
        // `diff -u` output has no `diff --git` line; the split finds no
        // file boundary and warns rather than guessing one.
        let diff = "--- a/notes.txt\n\
                    +++ b/notes.txt\n\
                    @@ -1,1 +1,1 @@\n\
                    -a\n\
                    +b";
        assert!(split_unified_diff(diff).is_empty());
    }

    #[test]
    fn split_filenames_match_github_api_format() {
        let diff = "diff --git a/src/main.rs b/src/main.rs\n\
                    --- a/src/main.rs\n\
                    +++ b/src/main.rs\n\
                    @@ -1,1 +1,1 @@\n\
                    -a\n\
                    +b";
        let result = split_unified_diff(diff);
        let filename = result.keys().next().unwrap();
        assert!(!filename.starts_with("a/"));
        assert!(!filename.starts_with("b/"));
        assert_eq!(filename, "src/main.rs");
    }
}
