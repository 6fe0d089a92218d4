//! Automatic reveal of lines targeted by annotations.
//!
//! AI suggestions and review comments arrive addressed by new-side line
//! numbers; the lines they point at may be hidden inside a gap. The
//! resolver groups a batch of targets, decides which groups are fully
//! invisible, and drives the minimal range expansion to reveal them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::expand::{EofOutcome, ExpansionEngine};
use super::registry::DiffSet;
use super::GapId;

/// Default context lines revealed around an annotation target; the
/// config's `expansion.context_radius` overrides it.
pub const ANNOTATION_CONTEXT_RADIUS: u32 = 3;

/// One annotation's location, as supplied by the comment/suggestion
/// store. New-side line numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationTarget {
    pub file: String,
    pub line_start: u32,
    pub line_end: u32,
}

/// Per-group resolution result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    /// At least part of the range was already visible; nothing done.
    AlreadyVisible,
    /// A gap was expanded to reveal the range.
    Revealed,
    /// No matching file or containing gap; reported, not retried.
    Unresolvable,
}

/// One resolved target group (targets sharing a file and start line).
#[derive(Debug, Clone)]
pub struct ResolvedGroup {
    pub file: String,
    pub line_start: u32,
    pub line_end: u32,
    pub outcome: RevealOutcome,
}

/// Reveal every annotation target currently hidden inside a gap.
///
/// Targets are grouped by file, then by `line_start` (co-located targets
/// merge to the largest `line_end`). Each hidden group expands its
/// containing gap with `context_radius` lines of context.
pub async fn reveal_annotation_targets(
    set: &mut DiffSet,
    engine: &ExpansionEngine<'_>,
    targets: &[AnnotationTarget],
    context_radius: u32,
) -> Vec<ResolvedGroup> {
    // file -> line_start -> max line_end
    let mut grouped: BTreeMap<&str, BTreeMap<u32, u32>> = BTreeMap::new();
    for target in targets {
        let end = target.line_end.max(target.line_start);
        grouped
            .entry(target.file.as_str())
            .or_default()
            .entry(target.line_start)
            .and_modify(|e| *e = (*e).max(end))
            .or_insert(end);
    }

    let mut results = Vec::new();
    for (file_name, groups) in grouped {
        for (line_start, line_end) in groups {
            let outcome = match set.get_mut(file_name) {
                Some(file) => {
                    resolve_group(file, engine, line_start, line_end, context_radius).await
                }
                None => {
                    warn!(file = file_name, line_start, "annotation targets unknown file");
                    RevealOutcome::Unresolvable
                }
            };
            results.push(ResolvedGroup {
                file: file_name.to_string(),
                line_start,
                line_end,
                outcome,
            });
        }
    }
    results
}

async fn resolve_group(
    file: &mut super::registry::FileDiff,
    engine: &ExpansionEngine<'_>,
    line_start: u32,
    line_end: u32,
    context_radius: u32,
) -> RevealOutcome {
    let visible = file.visible_new_lines();
    if (line_start..=line_end).any(|line| visible.contains(&line)) {
        return RevealOutcome::AlreadyVisible;
    }

    let Some((gap_id, old_start, old_end)) = locate_gap(file, engine, line_start, line_end).await
    else {
        warn!(
            file = file.filename(),
            line_start, line_end, "no gap contains annotation target"
        );
        return RevealOutcome::Unresolvable;
    };

    match engine
        .expand_range(file, gap_id, old_start, old_end, context_radius)
        .await
    {
        Ok(super::ExpandOutcome::Revealed { .. }) => RevealOutcome::Revealed,
        Ok(other) => {
            warn!(
                file = file.filename(),
                gap = gap_id,
                ?other,
                "annotation expansion was a no-op"
            );
            RevealOutcome::Unresolvable
        }
        Err(e) => {
            warn!(file = file.filename(), gap = gap_id, error = %e, "annotation expansion failed");
            RevealOutcome::Unresolvable
        }
    }
}

/// Find the gap containing the target and translate the target into the
/// gap's old-side coordinates. New-side coordinates are tried first
/// (annotations use new-side numbering), old-side as a fallback.
async fn locate_gap(
    file: &mut super::registry::FileDiff,
    engine: &ExpansionEngine<'_>,
    line_start: u32,
    line_end: u32,
) -> Option<(GapId, u32, u32)> {
    // A trailing gap may still be unvalidated; resolve its end first so
    // coordinate mapping and the 70%-degrade rule have real bounds.
    if file.unvalidated_trailing_gap().is_some() {
        match engine.validate_trailing_gap(file).await {
            Ok(EofOutcome::Validated { .. } | EofOutcome::Retired | EofOutcome::NothingToValidate) => {}
            Err(e) => {
                warn!(file = file.filename(), error = %e, "trailing gap validation failed");
            }
        }
    }

    if let Some(id) = file.find_gap_for_new_range(line_start, line_end) {
        let gap = file.gap(id)?;
        let map = gap.coords()?;
        let old_start = map.to_old(line_start.max(map.new_start())).unwrap_or(gap.old_start);
        let old_end = map.to_old(line_end.min(map.new_end())).unwrap_or(map.old_end);
        return Some((id, old_start, old_end));
    }

    // Fallback: interpret the target as old-side numbers.
    if let Some(id) = file.find_gap_for_old_range(line_start, line_end) {
        let gap = file.gap(id)?;
        let old_end_bound = gap.known_end()?;
        return Some((
            id,
            line_start.max(gap.old_start),
            line_end.min(old_end_bound),
        ));
    }

    None
}
