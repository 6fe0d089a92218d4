//! Old/new line-number mapping inside one unchanged span.
//!
//! No edits occur inside a gap, so the old-to-new delta is a single
//! constant for the whole span and for any remainder split from it.

/// Coordinate map for a contiguous unchanged span `[old_start, old_end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateMap {
    pub old_start: u32,
    pub old_end: u32,
    /// `new_start - old_start`. Negative when the new side has fewer
    /// preceding lines than the old side.
    pub offset: i64,
}

impl CoordinateMap {
    pub fn new(old_start: u32, old_end: u32, offset: i64) -> Self {
        Self {
            old_start,
            old_end,
            offset,
        }
    }

    fn contains_old(&self, old_line: u32) -> bool {
        (self.old_start..=self.old_end).contains(&old_line)
    }

    /// Map an old-side line number to the new side. `None` outside the
    /// span's bounds.
    pub fn to_new(&self, old_line: u32) -> Option<u32> {
        if !self.contains_old(old_line) {
            return None;
        }
        u32::try_from(i64::from(old_line) + self.offset).ok()
    }

    /// Map a new-side line number back to the old side. `None` outside
    /// the span's bounds.
    pub fn to_old(&self, new_line: u32) -> Option<u32> {
        let old = u32::try_from(i64::from(new_line) - self.offset).ok()?;
        self.contains_old(old).then_some(old)
    }

    pub fn new_start(&self) -> u32 {
        // Constructed from new_start - old_start, so this cannot underflow.
        (i64::from(self.old_start) + self.offset) as u32
    }

    pub fn new_end(&self) -> u32 {
        (i64::from(self.old_end) + self.offset) as u32
    }
}
