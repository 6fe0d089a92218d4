//! Structured patch parsing for one file.
//!
//! Turns a single file's unified-diff text into ordered hunks of lines,
//! each carrying old/new line numbers and the sequential diff position
//! used to anchor review comments (GitHub `position` semantics: meta
//! lines are skipped, the first `@@` header is not counted, subsequent
//! `@@` headers are).

use tracing::warn;

use crate::error::MalformedHunkHeader;

/// Kind of a line inside a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Unchanged; present on both sides.
    Context,
    /// Added in the new version.
    Insert,
    /// Removed from the old version.
    Delete,
}

/// Which diff column a line (or a comment on it) is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Old side, anchored by the old line number (delete lines).
    Left,
    /// New side, anchored by the new line number (insert/context lines).
    Right,
}

/// One line of a parsed hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: LineKind,
    /// Old-side line number. Absent for inserts.
    pub old_number: Option<u32>,
    /// New-side line number. Absent for deletes.
    pub new_number: Option<u32>,
    /// Content without the `+`/`-`/space prefix.
    pub content: String,
    /// 1-based position within the uploaded patch. `None` for lines
    /// revealed later by gap expansion (they were never part of it).
    pub diff_position: Option<u32>,
}

impl DiffLine {
    /// Exactly one side is derivable from the kind.
    pub fn side(&self) -> Side {
        match self.kind {
            LineKind::Delete => Side::Left,
            LineKind::Insert | LineKind::Context => Side::Right,
        }
    }

    /// Build a context line revealed by gap expansion. Carries no diff
    /// position by construction.
    pub fn revealed(old_number: u32, new_number: u32, content: String) -> Self {
        Self {
            kind: LineKind::Context,
            old_number: Some(old_number),
            new_number: Some(new_number),
            content,
            diff_position: None,
        }
    }
}

/// A contiguous block of the diff bounded by an `@@` header.
///
/// Immutable once parsed; gap expansion never rewrites hunks, it only
/// splices revealed lines around them.
#[derive(Debug, Clone)]
pub struct Hunk {
    /// The raw `@@ ... @@` line.
    pub header: String,
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    /// Diff position of the header itself. `None` for the file's first
    /// hunk (GitHub starts counting below it).
    pub header_position: Option<u32>,
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    /// Last old-side line this hunk touches. For pure-insert hunks
    /// (`old_count == 0`) the insertion point line itself.
    pub fn old_end(&self) -> u32 {
        self.lines
            .iter()
            .filter_map(|l| l.old_number)
            .max()
            .unwrap_or(self.old_start)
    }

    /// Last new-side line this hunk touches.
    pub fn new_end(&self) -> u32 {
        self.lines
            .iter()
            .filter_map(|l| l.new_number)
            .max()
            .unwrap_or(self.new_start)
    }
}

/// Parse result for one file's patch text.
#[derive(Debug, Clone, Default)]
pub struct ParsedPatch {
    pub hunks: Vec<Hunk>,
    /// Hunk headers that failed to parse and were dropped.
    pub dropped_hunks: usize,
}

/// Parse `@@ -old[,count] +new[,count] @@` into (old_start, old_count,
/// new_start, new_count). Count defaults to 1 when omitted.
fn parse_hunk_spec(header: &str) -> Result<(u32, u32, u32, u32), MalformedHunkHeader> {
    let malformed = || MalformedHunkHeader(header.to_string());

    let body = header
        .strip_prefix("@@ ")
        .and_then(|rest| rest.find(" @@").map(|end| &rest[..end]))
        .ok_or_else(malformed)?;

    let mut parts = body.split(' ');
    let old = parts.next().ok_or_else(malformed)?;
    let new = parts.next().ok_or_else(malformed)?;

    let parse_side = |spec: &str, prefix: char| -> Option<(u32, u32)> {
        let spec = spec.strip_prefix(prefix)?;
        match spec.split_once(',') {
            Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
            None => Some((spec.parse().ok()?, 1)),
        }
    };

    let (old_start, old_count) = parse_side(old, '-').ok_or_else(malformed)?;
    let (new_start, new_count) = parse_side(new, '+').ok_or_else(malformed)?;
    Ok((old_start, old_count, new_start, new_count))
}

/// Parse one file's patch text into ordered hunks.
///
/// A hunk whose header fails the numeric pattern is dropped wholesale:
/// its lines consume no diff positions and no gaps are later inferred
/// for it. The rest of the file parses normally.
pub fn parse_file_patch(patch: &str) -> ParsedPatch {
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut dropped_hunks = 0usize;

    // None until the first valid header; Some(0) means "first header
    // seen, nothing counted yet".
    let mut position: Option<u32> = None;
    let mut current: Option<(Hunk, u32, u32)> = None; // (hunk, next_old, next_new)
    let mut skipping = false;

    for raw in patch.lines() {
        if raw.starts_with("@@") {
            if let Some((hunk, _, _)) = current.take() {
                hunks.push(hunk);
            }
            match parse_hunk_spec(raw) {
                Ok((old_start, old_count, new_start, new_count)) => {
                    skipping = false;
                    let header_position = match position {
                        None => {
                            position = Some(0);
                            None
                        }
                        Some(p) => {
                            position = Some(p + 1);
                            Some(p + 1)
                        }
                    };
                    current = Some((
                        Hunk {
                            header: raw.to_string(),
                            old_start,
                            old_count,
                            new_start,
                            new_count,
                            header_position,
                            lines: Vec::new(),
                        },
                        old_start,
                        new_start,
                    ));
                }
                Err(e) => {
                    warn!("{e}; dropping hunk");
                    dropped_hunks += 1;
                    skipping = true;
                }
            }
            continue;
        }

        // File preamble (`diff --git`, `index`, `---`/`+++`) is only meta
        // before the first header. Inside a hunk body the sign column
        // decides: a body line may legitimately start with "--" or "++".
        if position.is_none() || skipping {
            continue;
        }
        if raw.starts_with("\\ No newline") {
            continue;
        }
        let Some((hunk, next_old, next_new)) = current.as_mut() else {
            continue;
        };

        let pos = position.as_mut().map(|p| {
            *p += 1;
            *p
        });
        let line = match raw.as_bytes().first() {
            Some(b'+') => {
                let n = *next_new;
                *next_new += 1;
                DiffLine {
                    kind: LineKind::Insert,
                    old_number: None,
                    new_number: Some(n),
                    content: raw[1..].to_string(),
                    diff_position: pos,
                }
            }
            Some(b'-') => {
                let o = *next_old;
                *next_old += 1;
                DiffLine {
                    kind: LineKind::Delete,
                    old_number: Some(o),
                    new_number: None,
                    content: raw[1..].to_string(),
                    diff_position: pos,
                }
            }
            _ => {
                let (o, n) = (*next_old, *next_new);
                *next_old += 1;
                *next_new += 1;
                DiffLine {
                    kind: LineKind::Context,
                    old_number: Some(o),
                    new_number: Some(n),
                    content: raw.strip_prefix(' ').unwrap_or(raw).to_string(),
                    diff_position: pos,
                }
            }
        };
        hunk.lines.push(line);
    }

    if let Some((hunk, _, _)) = current.take() {
        hunks.push(hunk);
    }

    ParsedPatch {
        hunks,
        dropped_hunks,
    }
}
