//! Pace extrapolation, deviation from the market line, and the per-match
//! change tracker used to enrich the active-matches view.

use dashmap::DashMap;
use serde::Serialize;

use crate::config::{PACE_CEILING, PACE_FLOOR, PACE_LINE_CAP_RATIO};
use crate::phase::elapsed_minutes;

/// Extrapolated final total from points scored so far.
///
/// Raw pace is `points * period_length / elapsed`; two clamps apply in order:
/// a cap at `PACE_LINE_CAP_RATIO` times the market line when one exists, then
/// the absolute `[PACE_FLOOR, PACE_CEILING]` bounds for the no-line case.
/// Returns None ("not computable") when no time has elapsed or no points
/// have been scored — zero would read as a real projection.
pub fn compute_pace(
    elapsed_min: f64,
    total_points: i64,
    period_length_min: u32,
    total_line: Option<f64>,
) -> Option<f64> {
    if elapsed_min <= 0.0 || total_points == 0 {
        return None;
    }

    let mut pace = total_points as f64 * f64::from(period_length_min) / elapsed_min;
    if let Some(line) = total_line {
        if line > 0.0 {
            pace = pace.min(line * PACE_LINE_CAP_RATIO);
        }
    }
    Some(pace.clamp(PACE_FLOOR, PACE_CEILING))
}

/// Percentage deviation of pace from the market line. Undefined without
/// a positive line.
pub fn deviation_percent(pace: f64, total_line: Option<f64>) -> Option<f64> {
    let line = total_line.filter(|l| *l > 0.0)?;
    Some((pace - line) / line * 100.0)
}

/// Pace figures attached to each observation on the read side.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PaceView {
    pub pace: Option<f64>,
    pub deviation_percent: Option<f64>,
    pub minutes_elapsed: Option<f64>,
}

/// Compute the full pace view from a stored observation's fields.
pub fn pace_view(
    clock: &str,
    total_points: i64,
    period_length_min: u32,
    total_line: Option<f64>,
) -> PaceView {
    let Some(minutes) = elapsed_minutes(clock) else {
        return PaceView::default();
    };
    let pace = compute_pace(minutes, total_points, period_length_min, total_line);
    PaceView {
        pace: pace.map(round1),
        deviation_percent: pace.and_then(|p| deviation_percent(p, total_line)).map(round1),
        minutes_elapsed: Some(round1(minutes)),
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// ChangeTracker — per-match previous-value state for delta computation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct PrevValues {
    last_line: Option<f64>,
    last_pace: Option<f64>,
    first_line: Option<f64>,
}

/// Deltas relative to the previous poll and to the first line this tracker
/// saw for the match.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Changes {
    pub line_change_percent: Option<f64>,
    pub pace_change_percent: Option<f64>,
    pub opening_line_diff_percent: Option<f64>,
}

/// Explicit per-match previous-value map owned by the enrichment stage.
/// Each instance is independent — repeated or concurrent runs never share
/// hidden state through globals.
#[derive(Default)]
pub struct ChangeTracker {
    prev: DashMap<i64, PrevValues>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current line/pace for a match and return deltas against
    /// the previous call. The first call for a match seeds the state and
    /// returns empty changes.
    pub fn update(&self, match_id: i64, line: Option<f64>, pace: Option<f64>) -> Changes {
        let Some(prev) = self.prev.get(&match_id).map(|p| *p) else {
            self.prev.insert(
                match_id,
                PrevValues { last_line: line, last_pace: pace, first_line: line },
            );
            return Changes::default();
        };

        let changes = Changes {
            line_change_percent: percent_change(prev.last_line, line),
            pace_change_percent: percent_change(prev.last_pace, pace),
            opening_line_diff_percent: percent_change(prev.first_line, line),
        };

        self.prev.insert(
            match_id,
            PrevValues {
                last_line: line.or(prev.last_line),
                last_pace: pace.or(prev.last_pace),
                first_line: prev.first_line.or(line),
            },
        );

        changes
    }
}

fn percent_change(from: Option<f64>, to: Option<f64>) -> Option<f64> {
    let from = from.filter(|f| *f != 0.0)?;
    let to = to?;
    Some(round1((to - from) / from * 100.0))
}
