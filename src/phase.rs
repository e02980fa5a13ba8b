//! Period derivation from the game clock, period-length classification,
//! and the clock-based completion predicate.

use crate::config::{
    DEFAULT_PERIOD_LENGTH_MIN, LEAGUES_40_MIN, LEAGUES_48_MIN, OT_BLOCK_MINUTES,
    REGULATION_PERIODS,
};
use crate::types::PeriodLabel;

/// Parse an `MM:SS` clock into elapsed seconds. The minutes field may exceed
/// 60 (overtime clocks keep counting). Placeholder (`-`) and colon-less
/// strings are rejected.
pub fn elapsed_seconds(clock: &str) -> Option<u32> {
    let (mins, secs) = clock.split_once(':')?;
    let mins: u32 = mins.trim().parse().ok()?;
    let secs: u32 = secs.trim().parse().ok()?;
    Some(mins * 60 + secs)
}

/// Elapsed time in fractional minutes, for pace extrapolation.
pub fn elapsed_minutes(clock: &str) -> Option<f64> {
    elapsed_seconds(clock).map(|s| f64::from(s) / 60.0)
}

/// Whole minutes shown on the clock. More lenient than `elapsed_seconds`:
/// a bare numeric string counts as minutes, matching how scoreboard clocks
/// degrade near the final buzzer.
fn whole_minutes(clock: &str) -> Option<u32> {
    let mins = clock.split(':').next()?;
    mins.trim().parse().ok()
}

/// Resolve the regulation length in minutes. An explicit in-page format
/// marker (`2x10`, `4x12`, ...) wins over the tournament-name table, which
/// wins over the 40-minute default.
pub fn period_length_minutes(tournament: &str, format_marker: Option<&str>) -> u32 {
    if let Some(marker) = format_marker {
        if let Some(minutes) = parse_format_marker(marker) {
            return minutes;
        }
    }

    let upper = tournament.to_uppercase();
    if LEAGUES_48_MIN.iter().any(|league| upper.contains(league)) {
        return 48;
    }
    if LEAGUES_40_MIN.iter().any(|league| upper.contains(league)) {
        return 40;
    }
    DEFAULT_PERIOD_LENGTH_MIN
}

/// `2x10` → 20, `4x12` → 48. None for anything that isn't `AxB`.
fn parse_format_marker(marker: &str) -> Option<u32> {
    let (periods, len) = marker.trim().split_once(['x', 'X'])?;
    let periods: u32 = periods.trim().parse().ok()?;
    let len: u32 = len.trim().parse().ok()?;
    Some(periods * len)
}

/// Derive the period label from elapsed time. Regulation is four equal
/// spans; anything at or past the regulation end maps to a fixed-length
/// overtime block index. Malformed clocks yield `Unknown`.
pub fn derive_period(clock: &str, period_length_min: u32) -> PeriodLabel {
    let Some(elapsed) = elapsed_seconds(clock) else {
        return PeriodLabel::Unknown;
    };

    let regulation_secs = period_length_min * 60;
    if elapsed < regulation_secs {
        let span = regulation_secs / REGULATION_PERIODS;
        PeriodLabel::Regulation(elapsed / span + 1)
    } else {
        let ot_span = OT_BLOCK_MINUTES * 60;
        PeriodLabel::Overtime((elapsed - regulation_secs) / ot_span + 1)
    }
}

/// True once the clock has reached the final minute of regulation.
/// The one-minute tolerance absorbs scoreboard rounding at the buzzer;
/// overtime clocks (past regulation) trivially satisfy it.
pub fn is_fully_completed(clock: &str, period_length_min: u32) -> bool {
    match whole_minutes(clock) {
        Some(mins) => mins >= period_length_min.saturating_sub(1),
        None => false,
    }
}
