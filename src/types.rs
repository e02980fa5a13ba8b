use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// One raw record from the upstream scraper, exactly as scraped.
/// Every market field may be the `-` placeholder; prices may use a comma
/// decimal separator. Normalization happens in `normalize`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSnapshot {
    /// Team-pairing string — the stable match identity key.
    pub teams: String,
    #[serde(default)]
    pub tournament: Option<String>,
    /// Game clock as `MM:SS`, or `-` when the scoreboard shows none.
    pub clock: String,
    /// Score as `A:B`, or `-`.
    #[serde(default)]
    pub score: Option<String>,
    /// Market total line as a numeric string, or `-`.
    #[serde(default)]
    pub total: Option<String>,
    #[serde(default)]
    pub under: Option<String>,
    #[serde(default)]
    pub over: Option<String>,
    /// Moneyline prices for each side.
    #[serde(default)]
    pub home: Option<String>,
    #[serde(default)]
    pub away: Option<String>,
    /// In-page period-format marker (e.g. `2x10`), when the scraper saw one.
    #[serde(default)]
    pub format: Option<String>,
}

/// A validated, type-coerced snapshot ready for the registry and recorder.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub teams: String,
    pub tournament: String,
    pub clock: String,
    pub period_length_min: u32,
    /// Normalized `A:B` score text, `-` when unknown.
    pub score: String,
    pub total_points: i64,
    pub total_line: Option<f64>,
    pub under_price: Option<f64>,
    pub over_price: Option<f64>,
    pub home_price: Option<f64>,
    pub away_price: Option<f64>,
}

// ---------------------------------------------------------------------------
// Match lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Active,
    Finished,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Active => "active",
            MatchStatus::Finished => "finished",
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of resolving a snapshot against the registry.
#[derive(Debug, Clone, Copy)]
pub struct Resolution {
    pub match_id: i64,
    pub is_new: bool,
    /// True when the stored match is already finished. Finished is terminal:
    /// the caller must not record new observations against it.
    pub finished: bool,
}

// ---------------------------------------------------------------------------
// Phase derivation
// ---------------------------------------------------------------------------

/// Period derived purely from the game clock. Malformed clocks map to
/// `Unknown`, never to a default numeric period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodLabel {
    Regulation(u32),
    Overtime(u32),
    Unknown,
}

impl std::fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeriodLabel::Regulation(n) => write!(f, "{n}"),
            PeriodLabel::Overtime(n) => write!(f, "OT{n}"),
            PeriodLabel::Unknown => write!(f, "unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// Recorder / signal / grading outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted { signal_fired: bool },
    /// The incoming game clock matches the latest stored clock — the poll
    /// cycle observed no game progress, nothing to store.
    SkippedDuplicate,
}

/// Settlement of the tracked position (an "under" on the total line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BetResult {
    Win,
    Lose,
    Push,
}

impl BetResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetResult::Win => "WIN",
            BetResult::Lose => "LOSE",
            BetResult::Push => "PUSH",
        }
    }
}

impl std::fmt::Display for BetResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Reports — returned by ingest/sync/rescan and serialized on the API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SyncReport {
    /// Matches flipped active → finished this pass.
    pub transitioned: u64,
    /// Of those, matches graded synchronously on the fast path.
    pub completed: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RescanReport {
    /// Finished matches carrying a signal but no grading.
    pub scanned: u64,
    /// Newly created gradings.
    pub graded: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IngestReport {
    pub received: u64,
    pub recorded: u64,
    pub skipped_duplicates: u64,
    /// Snapshots dropped: banned tournament, finished match, or a storage
    /// error isolated to that one match.
    pub dropped: u64,
    pub new_matches: u64,
    pub signals_fired: u64,
    pub transitioned: u64,
    pub graded: u64,
}
