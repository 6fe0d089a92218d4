//! Per-file gap registry and ordered row stream.
//!
//! [`FileDiff`] owns everything the rendering surface consumes for one
//! file: hunk headers, diff lines, and gap markers, in file order. Gaps
//! are computed once from the parsed hunks; the expansion engine mutates
//! them only through the splice primitives here, which re-check the
//! total-order invariant after every edit.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::diff::{parse_file_patch, DiffLine, Hunk, ParsedPatch};

use super::{Gap, GapEnd, GapId, GapPosition, GapState};

/// One element of the ordered output stream for a file.
#[derive(Debug, Clone)]
pub enum Row {
    /// The `@@` pseudo-line. Carries a diff position except for the
    /// file's first hunk.
    HunkHeader { text: String, position: Option<u32> },
    /// A diff line (from the patch) or a revealed line (no position).
    Line(DiffLine),
    /// Placeholder for a still-hidden span.
    Gap(GapId),
}

/// Old-side span for a remainder gap produced by a splice.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GapSpan {
    pub old_start: u32,
    pub old_end: GapEnd,
    pub position: GapPosition,
}

/// Parsed diff plus gap registry for a single file.
#[derive(Debug)]
pub struct FileDiff {
    filename: String,
    rows: Vec<Row>,
    gaps: BTreeMap<GapId, Gap>,
    next_gap_id: GapId,
    dropped_hunks: usize,
}

impl FileDiff {
    /// Build the row stream and gap registry from one file's patch text.
    pub fn from_patch(filename: impl Into<String>, patch: &str) -> Self {
        Self::from_parsed(filename, parse_file_patch(patch))
    }

    pub fn from_parsed(filename: impl Into<String>, parsed: ParsedPatch) -> Self {
        let mut this = Self {
            filename: filename.into(),
            rows: Vec::new(),
            gaps: BTreeMap::new(),
            next_gap_id: 1,
            dropped_hunks: parsed.dropped_hunks,
        };

        let hunks = parsed.hunks;
        for (i, hunk) in hunks.iter().enumerate() {
            let (old_start, new_start) = Self::hunk_boundary(hunk);
            if i == 0 {
                // Gap above the first hunk.
                if old_start > 1 {
                    let offset = i64::from(new_start) - i64::from(old_start);
                    this.push_gap(1, GapEnd::Known(old_start - 1), offset, GapPosition::Above);
                }
            } else {
                // Gap between the previous hunk and this one.
                let prev_end = hunks[i - 1].old_end();
                if old_start > prev_end + 1 {
                    let offset = i64::from(new_start) - i64::from(old_start);
                    this.push_gap(
                        prev_end + 1,
                        GapEnd::Known(old_start - 1),
                        offset,
                        GapPosition::Between,
                    );
                }
            }

            this.rows.push(Row::HunkHeader {
                text: hunk.header.clone(),
                position: hunk.header_position,
            });
            this.rows.extend(hunk.lines.iter().cloned().map(Row::Line));
        }

        // Trailing gap: end unknown until validated against the real
        // file length.
        if let Some(last) = hunks.last() {
            let old_start = last.old_end() + 1;
            let offset = i64::from(last.new_end() + 1) - i64::from(old_start);
            this.push_gap(old_start, GapEnd::Unknown, offset, GapPosition::Below);
        }

        this.assert_row_order();
        this
    }

    /// First line the hunk actually occupies on each side. A zero-count
    /// side (`-5,0` / `+5,0`) names the line *before* the hunk, so the
    /// hunk effectively starts one line later there.
    fn hunk_boundary(hunk: &Hunk) -> (u32, u32) {
        let old = if hunk.old_count == 0 {
            hunk.old_start + 1
        } else {
            hunk.old_start
        };
        let new = if hunk.new_count == 0 {
            hunk.new_start + 1
        } else {
            hunk.new_start
        };
        (old, new)
    }

    fn push_gap(&mut self, old_start: u32, old_end: GapEnd, offset: i64, position: GapPosition) {
        let id = self.next_gap_id;
        self.next_gap_id += 1;
        self.gaps.insert(
            id,
            Gap {
                id,
                old_start,
                old_end,
                new_start: (i64::from(old_start) + offset).max(0) as u32,
                offset,
                position,
                state: GapState::Collapsed,
                in_flight: false,
            },
        );
        self.rows.push(Row::Gap(id));
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Ordered output stream for the rendering surface.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Hunks dropped by the parser for malformed headers.
    pub fn dropped_hunks(&self) -> usize {
        self.dropped_hunks
    }

    pub fn gaps(&self) -> impl Iterator<Item = &Gap> {
        self.gaps.values()
    }

    pub fn gap(&self, id: GapId) -> Option<&Gap> {
        self.gaps.get(&id)
    }

    pub(crate) fn gap_mut(&mut self, id: GapId) -> Option<&mut Gap> {
        self.gaps.get_mut(&id)
    }

    /// The trailing gap still awaiting EOF validation, if any.
    pub fn unvalidated_trailing_gap(&self) -> Option<&Gap> {
        self.gaps
            .values()
            .find(|g| matches!(g.old_end, GapEnd::Unknown))
    }

    /// New-side line numbers currently visible (not hidden in a gap).
    pub fn visible_new_lines(&self) -> BTreeSet<u32> {
        self.rows
            .iter()
            .filter_map(|row| match row {
                Row::Line(line) => line.new_number,
                _ => None,
            })
            .collect()
    }

    /// The visible line with the given new-side number, if any.
    pub fn line_at_new(&self, new_line: u32) -> Option<&DiffLine> {
        self.rows.iter().find_map(|row| match row {
            Row::Line(line) if line.new_number == Some(new_line) => Some(line),
            _ => None,
        })
    }

    /// Gap overlapping `[start, end]` in new-side coordinates.
    pub fn find_gap_for_new_range(&self, start: u32, end: u32) -> Option<GapId> {
        self.gaps
            .values()
            .find(|g| start <= g.new_end_or_max() && end >= g.new_start)
            .map(|g| g.id)
    }

    /// Gap overlapping `[start, end]` in old-side coordinates.
    pub fn find_gap_for_old_range(&self, start: u32, end: u32) -> Option<GapId> {
        self.gaps
            .values()
            .find(|g| start <= g.old_end_or_max() && end >= g.old_start)
            .map(|g| g.id)
    }

    /// Resolve an EOF gap's end to a concrete line number.
    pub(crate) fn set_gap_end(&mut self, id: GapId, old_end: u32) {
        if let Some(gap) = self.gaps.get_mut(&id) {
            gap.old_end = GapEnd::Known(old_end);
        }
    }

    /// Remove a gap and its marker row without revealing anything (an
    /// EOF gap invalidated because the diff already reaches end of file).
    pub(crate) fn retire_gap(&mut self, id: GapId) -> bool {
        if self.gaps.remove(&id).is_none() {
            return false;
        }
        self.rows
            .retain(|row| !matches!(row, Row::Gap(g) if *g == id));
        true
    }

    /// Replace a gap marker with revealed lines plus optional remainder
    /// gaps above and below. Remainders inherit the parent's offset; the
    /// parent id is reused for the first remainder so a shrink stays "the
    /// same gap". Returns the remainder ids `(above, below)`.
    pub(crate) fn splice_gap(
        &mut self,
        id: GapId,
        above: Option<GapSpan>,
        lines: Vec<DiffLine>,
        below: Option<GapSpan>,
    ) -> (Option<GapId>, Option<GapId>) {
        let idx = self
            .rows
            .iter()
            .position(|row| matches!(row, Row::Gap(g) if *g == id));
        let (Some(idx), Some(parent)) = (idx, self.gaps.remove(&id)) else {
            return (None, None);
        };

        let mut replacement: Vec<Row> = Vec::with_capacity(lines.len() + 2);
        let mut reuse_parent_id = Some(parent.id);

        let mut make_remainder = |this: &mut Self, span: GapSpan| -> GapId {
            let rid = reuse_parent_id.take().unwrap_or_else(|| {
                let next = this.next_gap_id;
                this.next_gap_id += 1;
                next
            });
            this.gaps.insert(
                rid,
                Gap {
                    id: rid,
                    old_start: span.old_start,
                    old_end: span.old_end,
                    new_start: (i64::from(span.old_start) + parent.offset).max(0) as u32,
                    offset: parent.offset,
                    position: span.position,
                    state: GapState::PartiallyExpanded,
                    in_flight: false,
                },
            );
            rid
        };

        let above_id = above.map(|span| {
            let rid = make_remainder(self, span);
            replacement.push(Row::Gap(rid));
            rid
        });
        replacement.extend(lines.into_iter().map(Row::Line));
        let below_id = below.map(|span| {
            let rid = make_remainder(self, span);
            replacement.push(Row::Gap(rid));
            rid
        });

        self.rows.splice(idx..=idx, replacement);
        self.assert_row_order();
        (above_id, below_id)
    }

    /// Total-order invariant: old-side line numbers across lines and gap
    /// spans must be strictly increasing in row order. A violation means
    /// a splice corrupted the stream; mis-rendering silently is worse
    /// than dying here.
    fn assert_row_order(&self) {
        let mut last_old: u64 = 0;
        let mut last_new: u64 = 0;
        for row in &self.rows {
            match row {
                Row::HunkHeader { .. } => {}
                Row::Line(line) => {
                    if let Some(old) = line.old_number {
                        assert!(
                            u64::from(old) > last_old,
                            "row order violated in {}: old line {} after {}",
                            self.filename,
                            old,
                            last_old
                        );
                        last_old = u64::from(old);
                    }
                    if let Some(new) = line.new_number {
                        assert!(
                            u64::from(new) > last_new,
                            "row order violated in {}: new line {} after {}",
                            self.filename,
                            new,
                            last_new
                        );
                        last_new = u64::from(new);
                    }
                }
                Row::Gap(id) => {
                    let gap = self
                        .gaps
                        .get(id)
                        .unwrap_or_else(|| panic!("dangling gap marker {} in {}", id, self.filename));
                    assert!(
                        u64::from(gap.old_start) > last_old,
                        "row order violated in {}: gap starts at {} after {}",
                        self.filename,
                        gap.old_start,
                        last_old
                    );
                    if let Some(end) = gap.known_end() {
                        assert!(
                            end >= gap.old_start,
                            "inverted gap [{}, {}] in {}",
                            gap.old_start,
                            end,
                            self.filename
                        );
                        last_old = u64::from(end);
                        last_new = (i64::from(end) + gap.offset).max(0) as u64;
                    } else {
                        last_old = u64::MAX;
                        last_new = u64::MAX;
                    }
                }
            }
        }
    }
}

/// All files of one review diff, keyed by filename.
#[derive(Debug, Default)]
pub struct DiffSet {
    files: BTreeMap<String, FileDiff>,
}

impl DiffSet {
    /// Build from `filename -> patch text` (the output of
    /// [`crate::diff::split_unified_diff`] or the GitHub files API).
    pub fn from_patches(patches: HashMap<String, String>) -> Self {
        let mut set = Self::default();
        for (filename, patch) in patches {
            set.insert(FileDiff::from_patch(filename, &patch));
        }
        set
    }

    pub fn insert(&mut self, file: FileDiff) {
        self.files.insert(file.filename.clone(), file);
    }

    pub fn get(&self, filename: &str) -> Option<&FileDiff> {
        self.files.get(filename)
    }

    pub fn get_mut(&mut self, filename: &str) -> Option<&mut FileDiff> {
        self.files.get_mut(filename)
    }

    pub fn files(&self) -> impl Iterator<Item = &FileDiff> {
        self.files.values()
    }

    pub fn files_mut(&mut self) -> impl Iterator<Item = &mut FileDiff> {
        self.files.values_mut()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 50-line file, one hunk touching old lines 10-12.
    const ONE_HUNK: &str = "@@ -10,3 +10,4 @@\n ctx10\n+inserted\n ctx11\n ctx12";

    #[test]
    fn gaps_above_and_below_single_hunk() {
        let file = FileDiff::from_patch("a.js", ONE_HUNK);
        let gaps: Vec<&Gap> = file.gaps().collect();
        assert_eq!(gaps.len(), 2);

        let above = gaps.iter().find(|g| g.position == GapPosition::Above).unwrap();
        assert_eq!(above.old_start, 1);
        assert_eq!(above.known_end(), Some(9));
        assert_eq!(above.offset, 0);
        assert_eq!(above.new_start, 1);

        let below = gaps.iter().find(|g| g.position == GapPosition::Below).unwrap();
        assert_eq!(below.old_start, 13);
        assert_eq!(below.old_end, GapEnd::Unknown);
        // One insertion above, so old 13 maps to new 14.
        assert_eq!(below.offset, 1);
        assert_eq!(below.new_start, 14);
    }

    #[test]
    fn no_gap_when_hunk_starts_at_line_one() {
        let patch = "@@ -1,2 +1,3 @@\n one\n+two\n three";
        let file = FileDiff::from_patch("a.js", patch);
        assert!(file
            .gaps()
            .all(|g| g.position != GapPosition::Above));
    }

    #[test]
    fn between_gap_and_offsets() {
        let patch = "@@ -1,2 +1,3 @@\n a\n+b\n c\n@@ -10,2 +11,2 @@\n j\n-k";
        let file = FileDiff::from_patch("a.js", patch);
        let between = file
            .gaps()
            .find(|g| g.position == GapPosition::Between)
            .unwrap();
        // Hunk 1 ends at old 2, hunk 2 starts at old 10.
        assert_eq!(between.old_start, 3);
        assert_eq!(between.known_end(), Some(9));
        assert_eq!(between.offset, 1);
        assert_eq!(between.new_start, 4);
    }

    #[test]
    fn adjacent_hunks_produce_no_gap() {
        let patch = "@@ -1,2 +1,2 @@\n a\n-b\n+B\n@@ -3,2 +3,2 @@\n c\n-d\n+D";
        let file = FileDiff::from_patch("a.js", patch);
        assert!(file
            .gaps()
            .all(|g| g.position != GapPosition::Between));
    }

    #[test]
    fn insert_only_hunk_keeps_anchor_line_in_gap() {
        // "-5,0" names the line before the insertion: old line 5 is
        // unchanged and belongs to the gap above the hunk.
        let file = FileDiff::from_patch("a.txt", "@@ -5,0 +6,2 @@\n+a\n+b");

        let above = file
            .gaps()
            .find(|g| g.position == GapPosition::Above)
            .unwrap();
        assert_eq!(above.old_start, 1);
        assert_eq!(above.known_end(), Some(5));
        assert_eq!(above.offset, 0);

        let below = file
            .gaps()
            .find(|g| g.position == GapPosition::Below)
            .unwrap();
        assert_eq!(below.old_start, 6);
        assert_eq!(below.offset, 2);
    }

    #[test]
    fn delete_only_hunk_keeps_leading_offset_zero() {
        // "+5,0" names the line before the deletion on the new side; old
        // lines 1-5 still map straight across.
        let file = FileDiff::from_patch("a.txt", "@@ -6,2 +5,0 @@\n-x\n-y");

        let above = file
            .gaps()
            .find(|g| g.position == GapPosition::Above)
            .unwrap();
        assert_eq!(above.known_end(), Some(5));
        assert_eq!(above.offset, 0);

        let below = file
            .gaps()
            .find(|g| g.position == GapPosition::Below)
            .unwrap();
        assert_eq!(below.old_start, 8);
        assert_eq!(below.offset, -2);
    }

    #[test]
    fn insert_only_hunk_between_gap_covers_anchor_line() {
        let patch = "@@ -1,2 +1,2 @@\n a\n-b\n+B\n@@ -10,0 +11,1 @@\n+z";
        let file = FileDiff::from_patch("a.js", patch);
        let between = file
            .gaps()
            .find(|g| g.position == GapPosition::Between)
            .unwrap();
        // Old line 10 is the insertion anchor, still inside the gap.
        assert_eq!((between.old_start, between.known_end()), (3, Some(10)));
        assert_eq!(between.offset, 0);
    }

    #[test]
    fn no_hunks_no_gaps() {
        let file = FileDiff::from_patch("img.png", "Binary files a/img.png and b/img.png differ");
        assert_eq!(file.gaps().count(), 0);
        assert!(file.rows().is_empty());
    }

    #[test]
    fn old_side_coverage_is_contiguous() {
        // Gaps plus hunk lines must cover old lines 1..N without holes
        // or overlaps.
        let patch = "@@ -5,3 +5,3 @@\n a\n-b\n+B\n c\n@@ -20,2 +20,3 @@\n d\n+E\n f";
        let file = FileDiff::from_patch("a.js", patch);

        let mut covered: Vec<(u32, u32)> = Vec::new();
        for row in file.rows() {
            match row {
                Row::Line(line) => {
                    if let Some(o) = line.old_number {
                        covered.push((o, o));
                    }
                }
                Row::Gap(id) => {
                    let g = file.gap(*id).unwrap();
                    covered.push((g.old_start, g.known_end().unwrap_or(g.old_start)));
                }
                Row::HunkHeader { .. } => {}
            }
        }
        let mut expected_next = 1u32;
        for (start, end) in covered {
            assert_eq!(start, expected_next, "hole or overlap before {}", start);
            expected_next = end + 1;
        }
    }

    #[test]
    fn visible_new_lines_excludes_hidden_spans() {
        let file = FileDiff::from_patch("a.js", ONE_HUNK);
        let visible = file.visible_new_lines();
        assert!(visible.contains(&10));
        assert!(visible.contains(&13));
        assert!(!visible.contains(&9));
        assert!(!visible.contains(&14));
    }

    #[test]
    fn find_gap_by_new_and_old_coordinates() {
        let file = FileDiff::from_patch("a.js", ONE_HUNK);
        let above = file
            .gaps()
            .find(|g| g.position == GapPosition::Above)
            .unwrap()
            .id;
        let below = file
            .gaps()
            .find(|g| g.position == GapPosition::Below)
            .unwrap()
            .id;

        assert_eq!(file.find_gap_for_new_range(4, 4), Some(above));
        // Trailing gap is open-ended until validated.
        assert_eq!(file.find_gap_for_new_range(40, 40), Some(below));
        assert_eq!(file.find_gap_for_old_range(5, 6), Some(above));
        assert_eq!(file.find_gap_for_new_range(11, 12), None);
    }

    #[test]
    fn retire_gap_removes_marker() {
        let mut file = FileDiff::from_patch("a.js", ONE_HUNK);
        let above = file
            .gaps()
            .find(|g| g.position == GapPosition::Above)
            .unwrap()
            .id;
        assert!(file.retire_gap(above));
        assert!(file.gap(above).is_none());
        assert!(!file
            .rows()
            .iter()
            .any(|r| matches!(r, Row::Gap(id) if *id == above)));
        // Second retire is a no-op.
        assert!(!file.retire_gap(above));
    }

    #[test]
    fn splice_reuses_parent_id_for_first_remainder() {
        let mut file = FileDiff::from_patch("a.js", ONE_HUNK);
        let above = file
            .gaps()
            .find(|g| g.position == GapPosition::Above)
            .unwrap()
            .id;

        // Reveal old lines 4..6 out of [1, 9].
        let lines = (4..=6)
            .map(|o| DiffLine::revealed(o, o, format!("line {}", o)))
            .collect();
        let (above_id, below_id) = file.splice_gap(
            above,
            Some(GapSpan {
                old_start: 1,
                old_end: GapEnd::Known(3),
                position: GapPosition::Above,
            }),
            lines,
            Some(GapSpan {
                old_start: 7,
                old_end: GapEnd::Known(9),
                position: GapPosition::Below,
            }),
        );

        assert_eq!(above_id, Some(above));
        let below_id = below_id.unwrap();
        assert_ne!(below_id, above);

        let upper = file.gap(above).unwrap();
        assert_eq!((upper.old_start, upper.known_end()), (1, Some(3)));
        assert_eq!(upper.state, GapState::PartiallyExpanded);
        let lower = file.gap(below_id).unwrap();
        assert_eq!((lower.old_start, lower.known_end()), (7, Some(9)));
        // Both remainders inherit the parent offset.
        assert_eq!(upper.offset, 0);
        assert_eq!(lower.offset, 0);
    }

    #[test]
    #[should_panic(expected = "row order violated")]
    fn out_of_order_splice_fails_loudly() {
        let mut file = FileDiff::from_patch("a.js", ONE_HUNK);
        let above = file
            .gaps()
            .find(|g| g.position == GapPosition::Above)
            .unwrap()
            .id;
        // Lines claiming old numbers beyond the hunk corrupt the order.
        let bogus = vec![DiffLine::revealed(40, 40, "bogus".into())];
        file.splice_gap(above, None, bogus, None);
    }

    #[test]
    fn diff_set_round_trip() {
        let mut patches = HashMap::new();
        patches.insert("a.js".to_string(), ONE_HUNK.to_string());
        patches.insert(
            "b.js".to_string(),
            "@@ -1,1 +1,1 @@\n-x\n+y".to_string(),
        );
        let set = DiffSet::from_patches(patches);
        assert_eq!(set.len(), 2);
        assert!(set.get("a.js").is_some());
        assert!(set.get("missing.js").is_none());
    }
}
