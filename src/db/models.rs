//! Database row types matching the schema in migrations/0001_init.sql.

#[derive(Debug, sqlx::FromRow)]
pub struct ObservationRow {
    pub id: i64,
    pub match_id: i64,
    pub game_clock: String,
    pub period: Option<String>,
    pub score: Option<String>,
    pub total_points: i64,
    pub total_line: Option<f64>,
    pub under_price: Option<f64>,
    pub over_price: Option<f64>,
    pub home_price: Option<f64>,
    pub away_price: Option<f64>,
    pub recorded_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SignalRow {
    pub id: i64,
    pub match_id: i64,
    pub triggered_at: i64,
    pub trigger_clock: Option<String>,
    pub line: f64,
    pub opening_line: f64,
    pub deviation_percent: f64,
}
