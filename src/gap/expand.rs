//! Gap expansion: revealing hidden spans from original file content.
//!
//! All operations fetch through the [`ContentSource`] collaborator, then
//! re-locate the gap before mutating anything: the fetch is the only
//! await point, and the gap may have been retired, split, or torn down
//! while it was outstanding. A stale reference is a no-op, not an error.

use tracing::{debug, warn};

use crate::diff::DiffLine;
use crate::error::{ContentFetchError, ExpandError};
use crate::github::ContentSource;

use super::registry::{FileDiff, GapSpan};
use super::{GapEnd, GapId, GapPosition};

/// Which end of a gap a directional expansion consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Reveal from the bottom of the gap (the lines just above the next
    /// hunk).
    Up,
    /// Reveal from the top of the gap (the lines just below the previous
    /// hunk).
    Down,
}

/// Result of an expansion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandOutcome {
    /// Lines were spliced into the row stream.
    Revealed { lines: u32 },
    /// The gap no longer exists (already retired or split); nothing was
    /// done.
    Stale,
    /// A fetch for this gap is already outstanding; nothing was done.
    InFlight,
    /// The requested window does not intersect the gap; the gap is
    /// untouched.
    OutOfRange,
}

/// Result of trailing-gap EOF validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EofOutcome {
    /// End resolved; the gap hides this many lines.
    Validated { hidden: u32 },
    /// The diff already reaches end of file; the gap was retired with
    /// zero lines revealed.
    Retired,
    /// No trailing gap awaiting validation.
    NothingToValidate,
}

/// Expansion thresholds; see `Config` for the user-facing knobs.
#[derive(Debug, Clone, Copy)]
pub struct ExpansionLimits {
    /// A range reveal covering at least this share of the gap degrades
    /// to a full reveal.
    pub full_reveal_ratio: f64,
    /// Gaps at or below this many lines are always fully revealed.
    pub small_gap_lines: u32,
}

impl Default for ExpansionLimits {
    fn default() -> Self {
        Self {
            full_reveal_ratio: 0.7,
            small_gap_lines: 10,
        }
    }
}

/// Stateless driver for gap expansion against one content source.
pub struct ExpansionEngine<'a> {
    source: &'a dyn ContentSource,
    limits: ExpansionLimits,
}

impl<'a> ExpansionEngine<'a> {
    pub fn new(source: &'a dyn ContentSource) -> Self {
        Self {
            source,
            limits: ExpansionLimits::default(),
        }
    }

    pub fn with_limits(source: &'a dyn ContentSource, limits: ExpansionLimits) -> Self {
        Self { source, limits }
    }

    /// Reveal the whole gap and retire it.
    pub async fn expand_all(
        &self,
        file: &mut FileDiff,
        id: GapId,
    ) -> Result<ExpandOutcome, ExpandError> {
        let Some((old_start, old_end, offset)) = self.guard(file, id)? else {
            return Ok(self.release_or_report(file, id));
        };

        let content = self.fetch_guarded(file, id).await?;
        if !self.still_current(file, id, old_start, old_end) {
            return Ok(ExpandOutcome::Stale);
        }

        let lines = slice_lines(file.filename(), &content, old_start, old_end, offset)
            .map_err(|source| ExpandError::ContentFetch {
                file: file.filename().to_string(),
                source,
            })?;
        let revealed = lines.len() as u32;
        file.splice_gap(id, None, lines, None);
        debug!(file = file.filename(), gap = id, revealed, "gap fully revealed");
        Ok(ExpandOutcome::Revealed { lines: revealed })
    }

    /// Reveal `count` lines from one end of the gap, shrinking it to the
    /// unrevealed remainder (retiring it when nothing remains).
    pub async fn expand_directional(
        &self,
        file: &mut FileDiff,
        id: GapId,
        direction: Direction,
        count: u32,
    ) -> Result<ExpandOutcome, ExpandError> {
        let Some((old_start, old_end, offset)) = self.guard(file, id)? else {
            return Ok(self.release_or_report(file, id));
        };

        let size = old_end - old_start + 1;
        if count >= size {
            // Nothing would remain; degrade to a full reveal.
            return self.expand_all(file, id).await;
        }

        let content = self.fetch_guarded(file, id).await?;
        if !self.still_current(file, id, old_start, old_end) {
            return Ok(ExpandOutcome::Stale);
        }

        let (reveal_start, reveal_end, above, below) = match direction {
            Direction::Down => {
                let reveal_end = old_start + count - 1;
                let remainder = GapSpan {
                    old_start: reveal_end + 1,
                    old_end: GapEnd::Known(old_end),
                    position: gap_position(file, id),
                };
                (old_start, reveal_end, None, Some(remainder))
            }
            Direction::Up => {
                let reveal_start = old_end - count + 1;
                let remainder = GapSpan {
                    old_start,
                    old_end: GapEnd::Known(reveal_start - 1),
                    position: gap_position(file, id),
                };
                (reveal_start, old_end, Some(remainder), None)
            }
        };

        let lines = slice_lines(file.filename(), &content, reveal_start, reveal_end, offset)
            .map_err(|source| ExpandError::ContentFetch {
                file: file.filename().to_string(),
                source,
            })?;
        let revealed = lines.len() as u32;
        file.splice_gap(id, above, lines, below);
        Ok(ExpandOutcome::Revealed { lines: revealed })
    }

    /// Reveal `[target_start - radius, target_end + radius]` (old-side,
    /// clamped to the gap). Degrades to a full reveal when the window
    /// covers most of the gap or the gap is small; otherwise splits the
    /// gap into above/below remainders.
    pub async fn expand_range(
        &self,
        file: &mut FileDiff,
        id: GapId,
        target_start: u32,
        target_end: u32,
        context_radius: u32,
    ) -> Result<ExpandOutcome, ExpandError> {
        let Some((old_start, old_end, offset)) = self.guard(file, id)? else {
            return Ok(self.release_or_report(file, id));
        };

        let reveal_start = target_start.saturating_sub(context_radius).max(old_start);
        let reveal_end = target_end.saturating_add(context_radius).min(old_end);
        if reveal_start > reveal_end {
            return Ok(ExpandOutcome::OutOfRange);
        }

        let gap_size = old_end - old_start + 1;
        let reveal_size = reveal_end - reveal_start + 1;
        if gap_size <= self.limits.small_gap_lines
            || f64::from(reveal_size) >= f64::from(gap_size) * self.limits.full_reveal_ratio
        {
            return self.expand_all(file, id).await;
        }

        let content = self.fetch_guarded(file, id).await?;
        if !self.still_current(file, id, old_start, old_end) {
            return Ok(ExpandOutcome::Stale);
        }

        let above = (reveal_start > old_start).then_some(GapSpan {
            old_start,
            old_end: GapEnd::Known(reveal_start - 1),
            position: GapPosition::Above,
        });
        let below = (reveal_end < old_end).then_some(GapSpan {
            old_start: reveal_end + 1,
            old_end: GapEnd::Known(old_end),
            position: GapPosition::Below,
        });

        let lines = slice_lines(file.filename(), &content, reveal_start, reveal_end, offset)
            .map_err(|source| ExpandError::ContentFetch {
                file: file.filename().to_string(),
                source,
            })?;
        let revealed = lines.len() as u32;
        file.splice_gap(id, above, lines, below);
        Ok(ExpandOutcome::Revealed { lines: revealed })
    }

    /// Resolve the trailing gap's unknown end against the real file
    /// length. Must run before the trailing gap can expand. Independent
    /// across files, so callers may fan out the fetches.
    pub async fn validate_trailing_gap(
        &self,
        file: &mut FileDiff,
    ) -> Result<EofOutcome, ExpandError> {
        let Some(gap) = file.unvalidated_trailing_gap() else {
            return Ok(EofOutcome::NothingToValidate);
        };
        let id = gap.id;
        let old_start = gap.old_start;

        let total = self
            .source
            .line_count(file.filename())
            .await
            .map_err(|source| ExpandError::ContentFetch {
                file: file.filename().to_string(),
                source,
            })?;

        Ok(apply_trailing_validation(file, id, old_start, total))
    }

    /// Entry guard: stale and in-flight gaps short-circuit; an
    /// unvalidated EOF gap is a caller error. Returns the gap's bounds
    /// snapshot when expansion may proceed.
    fn guard(
        &self,
        file: &FileDiff,
        id: GapId,
    ) -> Result<Option<(u32, u32, i64)>, ExpandError> {
        let Some(gap) = file.gap(id) else {
            return Ok(None);
        };
        if gap.in_flight {
            return Ok(None);
        }
        let Some(old_end) = gap.known_end() else {
            return Err(ExpandError::UnresolvedEnd {
                file: file.filename().to_string(),
            });
        };
        Ok(Some((gap.old_start, old_end, gap.offset)))
    }

    /// Distinguish the two no-op guard outcomes for reporting.
    fn release_or_report(&self, file: &FileDiff, id: GapId) -> ExpandOutcome {
        match file.gap(id) {
            Some(gap) if gap.in_flight => {
                warn!(file = file.filename(), gap = id, "expansion already in flight");
                ExpandOutcome::InFlight
            }
            Some(_) => ExpandOutcome::Stale,
            None => {
                debug!(file = file.filename(), gap = id, "stale gap reference");
                ExpandOutcome::Stale
            }
        }
    }

    /// Fetch with the per-gap in-flight flag held across the await.
    async fn fetch_guarded(
        &self,
        file: &mut FileDiff,
        id: GapId,
    ) -> Result<Vec<String>, ExpandError> {
        if let Some(gap) = file.gap_mut(id) {
            gap.in_flight = true;
        }
        let result = self.source.fetch_original(file.filename()).await;
        if let Some(gap) = file.gap_mut(id) {
            gap.in_flight = false;
        }
        result.map_err(|source| ExpandError::ContentFetch {
            file: file.filename().to_string(),
            source,
        })
    }

    /// Re-check after the await: the gap must still exist with the same
    /// bounds, otherwise the fetched result is discarded.
    fn still_current(&self, file: &FileDiff, id: GapId, old_start: u32, old_end: u32) -> bool {
        match file.gap(id) {
            Some(gap) => gap.old_start == old_start && gap.known_end() == Some(old_end),
            None => false,
        }
    }
}

/// Shared EOF-validation application step, usable without refetching when
/// the line count was obtained elsewhere (batch validation in the
/// loader).
pub(crate) fn apply_trailing_validation(
    file: &mut FileDiff,
    id: GapId,
    old_start: u32,
    total_lines: u32,
) -> EofOutcome {
    if old_start > total_lines {
        // The diff already reaches end of file; the gap hides nothing.
        file.retire_gap(id);
        debug!(file = file.filename(), gap = id, "trailing gap retired (at EOF)");
        EofOutcome::Retired
    } else {
        file.set_gap_end(id, total_lines);
        EofOutcome::Validated {
            hidden: total_lines - old_start + 1,
        }
    }
}

fn gap_position(file: &FileDiff, id: GapId) -> GapPosition {
    file.gap(id).map(|g| g.position).unwrap_or(GapPosition::Between)
}

/// Slice `[start, end]` (1-indexed, old-side) out of the fetched content
/// and pair each line with its mapped new-side number.
fn slice_lines(
    file: &str,
    content: &[String],
    start: u32,
    end: u32,
    offset: i64,
) -> Result<Vec<DiffLine>, ContentFetchError> {
    if (content.len() as u32) < end {
        return Err(ContentFetchError::Truncated {
            file: file.to_string(),
            expected: end,
            actual: content.len() as u32,
        });
    }
    Ok((start..=end)
        .map(|old| {
            let new = (i64::from(old) + offset).max(0) as u32;
            DiffLine::revealed(old, new, content[(old - 1) as usize].clone())
        })
        .collect())
}
