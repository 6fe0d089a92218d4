//! Gap model: the unchanged, diff-omitted spans between and around hunks.
//!
//! A [`Gap`] is a first-class entity with explicit state transitions
//! (collapsed → partially expanded → retired) rather than ad-hoc flags on
//! rendered rows. Gaps are created once per file by the registry, shrunk
//! or split in place by the expansion engine, and destroyed when fully
//! revealed.

pub mod coord;
pub mod expand;
pub mod registry;
pub mod visibility;

pub use coord::CoordinateMap;
pub use expand::{Direction, EofOutcome, ExpandOutcome, ExpansionEngine};
pub use registry::{DiffSet, FileDiff, Row};
pub use visibility::{
    reveal_annotation_targets, AnnotationTarget, ResolvedGroup, RevealOutcome,
    ANNOTATION_CONTEXT_RADIUS,
};

/// Identifier for a gap within one file. Never reused.
pub type GapId = u64;

/// Old-side end of a gap.
///
/// Trailing gaps start out `Unknown`: the diff alone cannot tell how many
/// unchanged lines follow the last hunk. EOF validation resolves it
/// against the real file length before any expansion may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapEnd {
    Known(u32),
    Unknown,
}

/// Where the gap sits relative to the hunks around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapPosition {
    /// Before the first hunk, or the upper remainder of a range split.
    Above,
    /// Between two adjacent hunks.
    Between,
    /// After the last hunk, or the lower remainder of a range split.
    Below,
}

/// Lifecycle state of a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapState {
    /// No line of the span has been revealed.
    Collapsed,
    /// Some lines revealed; this gap is a remainder of a larger span.
    PartiallyExpanded,
}

/// One unchanged span hidden by the diff.
#[derive(Debug, Clone)]
pub struct Gap {
    pub id: GapId,
    pub old_start: u32,
    pub old_end: GapEnd,
    pub new_start: u32,
    /// `new_start - old_start`; invariant across the gap's lifetime and
    /// across any remainder split from it.
    pub offset: i64,
    pub position: GapPosition,
    pub state: GapState,
    /// Set while a content fetch for this gap is outstanding. A second
    /// expansion request against the same gap is rejected as a no-op
    /// instead of risking a double reveal.
    pub(crate) in_flight: bool,
}

impl Gap {
    /// Old-side end if validated.
    pub fn known_end(&self) -> Option<u32> {
        match self.old_end {
            GapEnd::Known(end) => Some(end),
            GapEnd::Unknown => None,
        }
    }

    /// Hidden line count; `None` until an EOF gap is validated.
    pub fn hidden_lines(&self) -> Option<u32> {
        self.known_end()
            .map(|end| end.saturating_sub(self.old_start) + 1)
    }

    /// Coordinate map over the gap's validated bounds.
    pub fn coords(&self) -> Option<CoordinateMap> {
        self.known_end()
            .map(|end| CoordinateMap::new(self.old_start, end, self.offset))
    }

    /// New-side end; `u32::MAX` while the old end is unvalidated, so
    /// overlap tests against trailing gaps stay permissive.
    pub(crate) fn new_end_or_max(&self) -> u32 {
        match self.old_end {
            GapEnd::Known(end) => (i64::from(end) + self.offset).max(0) as u32,
            GapEnd::Unknown => u32::MAX,
        }
    }

    /// Old-side end; `u32::MAX` while unvalidated.
    pub(crate) fn old_end_or_max(&self) -> u32 {
        match self.old_end {
            GapEnd::Known(end) => end,
            GapEnd::Unknown => u32::MAX,
        }
    }
}
