use crate::error::{AppError, Result};

/// Trigger threshold: a signal fires when the current total line sits more
/// than this many percent above the opening line.
pub const DEFAULT_TRIGGER_PERCENT: f64 = 12.0;

/// Lifecycle sync only considers matches updated within this window.
/// Anything older is stale history and never flipped by the sync pass.
pub const STALENESS_WINDOW_SECS: u64 = 4 * 3600;

/// The active-matches view hides matches that stopped updating this long ago.
pub const ACTIVE_VIEW_WINDOW_SECS: u64 = 30 * 60;

/// Fixed overtime block length (minutes).
pub const OT_BLOCK_MINUTES: u32 = 5;

/// Regulation is always four periods; period length varies by tournament.
pub const REGULATION_PERIODS: u32 = 4;

/// Period length used when neither a format marker nor the tournament
/// table gives an answer (minutes).
pub const DEFAULT_PERIOD_LENGTH_MIN: u32 = 40;

/// Pace extrapolation is capped at this multiple of the market line when
/// a line exists — 2 points in the first 10 seconds extrapolates to an
/// absurd total otherwise.
pub const PACE_LINE_CAP_RATIO: f64 = 1.5;

/// Absolute pace bounds (points) guarding the no-line case.
pub const PACE_FLOOR: f64 = 50.0;
pub const PACE_CEILING: f64 = 300.0;

/// Rescan scheduler interval (seconds) — recovers matches the lifecycle
/// fast path marked finished without grading.
pub const RESCAN_INTERVAL_SECS: u64 = 300;

/// Tournaments playing 4x12 (48 minutes of regulation). Matched as
/// uppercase substrings of the tournament name.
pub const LEAGUES_48_MIN: &[&str] = &["NBA", "CDBL", "WCBA", "PBA", "PRIME DIVISION"];

/// Tournaments playing 4x10 (40 minutes of regulation).
pub const LEAGUES_40_MIN: &[&str] = &[
    "WNBA",
    "EUROLEAGUE",
    "EUROCUP",
    "VTB",
    "IPBL",
    "SUPERLEAGUE",
    "ACB",
    "LNB",
    "LEGABASKET",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Signal trigger threshold in percent (TRIGGER_PERCENT)
    pub trigger_percent: f64,
    /// Tournaments to drop at ingest (BANNED_TOURNAMENTS, comma-separated)
    pub banned_tournaments: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "courtline.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            trigger_percent: std::env::var("TRIGGER_PERCENT")
                .unwrap_or_else(|_| DEFAULT_TRIGGER_PERCENT.to_string())
                .parse::<f64>()
                .unwrap_or(DEFAULT_TRIGGER_PERCENT),
            banned_tournaments: std::env::var("BANNED_TOURNAMENTS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }
}
