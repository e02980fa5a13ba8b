//! Snapshot normalization: type-coerces a raw scraped record into a typed
//! `Snapshot`. Parse failures degrade to `None`/placeholder values and are
//! never propagated — the recorder forward-fills the gaps.

use crate::phase::period_length_minutes;
use crate::types::{RawSnapshot, Snapshot};

/// Price and line fields arrive as locale-formatted strings (`1,85`) or the
/// `-` placeholder. Comma decimal separators are normalized to dots; anything
/// unparseable becomes None.
pub fn parse_price(value: Option<&str>) -> Option<f64> {
    let value = value?.trim();
    if value.is_empty() || value == "-" {
        return None;
    }
    value.replace(',', ".").parse::<f64>().ok()
}

/// Parse an `A:B` score into normalized text plus the points sum. Anything
/// that is not two integers around a colon collapses to `("-", 0)`.
pub fn parse_score(value: Option<&str>) -> (String, i64) {
    let Some(raw) = value.map(str::trim) else {
        return ("-".to_string(), 0);
    };
    let Some((home, away)) = raw.split_once(':') else {
        return ("-".to_string(), 0);
    };
    match (home.trim().parse::<i64>(), away.trim().parse::<i64>()) {
        (Ok(h), Ok(a)) => (format!("{h}:{a}"), h + a),
        _ => ("-".to_string(), 0),
    }
}

/// Validate and coerce a raw snapshot. Returns None only when the identity
/// key is missing — a snapshot without teams cannot be resolved to anything.
pub fn normalize(raw: &RawSnapshot) -> Option<Snapshot> {
    let teams = raw.teams.trim();
    if teams.is_empty() {
        return None;
    }

    let tournament = raw
        .tournament
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("Unknown")
        .to_string();
    let period_length_min = period_length_minutes(&tournament, raw.format.as_deref());
    let (score, total_points) = parse_score(raw.score.as_deref());

    Some(Snapshot {
        teams: teams.to_string(),
        tournament,
        clock: raw.clock.trim().to_string(),
        period_length_min,
        score,
        total_points,
        total_line: parse_price(raw.total.as_deref()),
        under_price: parse_price(raw.under.as_deref()),
        over_price: parse_price(raw.over.as_deref()),
        home_price: parse_price(raw.home.as_deref()),
        away_price: parse_price(raw.away.as_deref()),
    })
}
