use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthState;
use crate::api::latency::{LatencyStats, LatencySummary};
use crate::config::ACTIVE_VIEW_WINDOW_SECS;
use crate::db::now_ns;
use crate::error::AppError;
use crate::grader::Grader;
use crate::ingest::IngestService;
use crate::pace::{pace_view, ChangeTracker, Changes, PaceView};
use crate::types::{IngestReport, RawSnapshot, RescanReport};

#[derive(Clone)]
pub struct ApiState {
    pub pool: sqlx::SqlitePool,
    pub ingest: Arc<IngestService>,
    pub grader: Grader,
    pub changes: Arc<ChangeTracker>,
    pub latency: Arc<LatencyStats>,
    pub health: Arc<HealthState>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/ingest", post(post_ingest))
        .route("/rescan", post(post_rescan))
        .route("/matches/active", get(get_active_matches))
        .route("/matches/:id/history", get(get_match_history))
        .route("/matches/finished", get(get_finished_matches))
        .route("/stats/summary", get(get_stats_summary))
        .route("/stats/latency", get(get_stats_latency))
        .route("/health", get(get_health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct IngestBody {
    pub snapshots: Vec<RawSnapshot>,
}

#[derive(Deserialize)]
pub struct FinishedQuery {
    /// Nanosecond epoch range on the finish time.
    pub since: Option<i64>,
    pub until: Option<i64>,
    /// Substring filters.
    pub tournament: Option<String>,
    pub team: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct SignalView {
    pub triggered_at: i64,
    pub line: f64,
    pub opening_line: f64,
    pub deviation_percent: f64,
}

#[derive(Serialize)]
pub struct ActiveMatchResponse {
    pub id: i64,
    pub teams: String,
    pub tournament: Option<String>,
    pub game_clock: Option<String>,
    pub period_length_min: i64,
    pub period: Option<String>,
    pub score: Option<String>,
    pub total_points: i64,
    pub total_line: Option<f64>,
    pub recorded_at: i64,
    #[serde(flatten)]
    pub pace: PaceView,
    #[serde(flatten)]
    pub changes: Changes,
    pub signal: Option<SignalView>,
}

#[derive(Serialize)]
pub struct HistoryPoint {
    pub game_clock: String,
    pub period: Option<String>,
    pub score: Option<String>,
    pub total_points: i64,
    pub total_line: Option<f64>,
    pub pace: Option<f64>,
    pub recorded_at: i64,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub match_id: i64,
    pub teams: String,
    pub period_length_min: i64,
    pub status: String,
    pub points: Vec<HistoryPoint>,
}

#[derive(Serialize)]
pub struct FinishedMatchResponse {
    pub id: i64,
    pub teams: String,
    pub tournament: Option<String>,
    pub finished_at: i64,
    pub opening_line: Option<f64>,
    pub final_line: Option<f64>,
    pub final_score: Option<String>,
    pub final_points: Option<i64>,
    pub signal_line: Option<f64>,
    pub signal_deviation_percent: Option<f64>,
    pub result: Option<String>,
    pub line_diff_percent: Option<f64>,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub total_matches: i64,
    pub active_matches: i64,
    pub finished_matches: i64,
    pub signals: i64,
    pub gradings: i64,
    pub wins: i64,
    pub losses: i64,
    pub pushes: i64,
    pub avg_line_deviation_percent: Option<f64>,
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct ActiveRow {
    id: i64,
    teams: String,
    tournament: Option<String>,
    game_clock: Option<String>,
    period_length_min: i64,
    period: Option<String>,
    score: Option<String>,
    total_points: i64,
    total_line: Option<f64>,
    recorded_at: i64,
    signal_at: Option<i64>,
    signal_line: Option<f64>,
    opening_line: Option<f64>,
    deviation_percent: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct FinishedRow {
    id: i64,
    teams: String,
    tournament: Option<String>,
    finished_at: i64,
    opening_line: Option<f64>,
    final_line: Option<f64>,
    final_score: Option<String>,
    final_points: Option<i64>,
    signal_line: Option<f64>,
    signal_deviation: Option<f64>,
    result: Option<String>,
    line_diff_percent: Option<f64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn post_ingest(
    State(state): State<ApiState>,
    Json(body): Json<IngestBody>,
) -> Json<IngestReport> {
    let started = Instant::now();
    let received = body.snapshots.len() as u64;

    let report = state.ingest.process_cycle(body.snapshots).await;

    state.latency.record(started.elapsed());
    state.health.record_cycle(now_ns() as u64, received);
    Json(report)
}

async fn post_rescan(State(state): State<ApiState>) -> Result<Json<RescanReport>, AppError> {
    Ok(Json(state.grader.rescan().await?))
}

async fn get_active_matches(
    State(state): State<ApiState>,
) -> Result<Json<Vec<ActiveMatchResponse>>, AppError> {
    let cutoff = now_ns() - (ACTIVE_VIEW_WINDOW_SECS as i64) * 1_000_000_000;

    let rows = sqlx::query_as::<_, ActiveRow>(
        r#"
        SELECT m.id, m.teams, m.tournament, m.game_clock, m.period_length_min,
               o.period, o.score, o.total_points, o.total_line, o.recorded_at,
               ws.triggered_at AS signal_at, ws.line AS signal_line,
               ws.opening_line, ws.deviation_percent
        FROM matches m
        JOIN observations o ON o.id = (SELECT MAX(id) FROM observations WHERE match_id = m.id)
        LEFT JOIN wager_signals ws ON ws.match_id = m.id
        WHERE m.status = 'active' AND m.updated_at > ?
        ORDER BY o.recorded_at DESC
        "#,
    )
    .bind(cutoff)
    .fetch_all(&state.pool)
    .await?;

    let matches = rows
        .into_iter()
        .map(|r| {
            let clock = r.game_clock.as_deref().unwrap_or("-");
            let pace = pace_view(clock, r.total_points, r.period_length_min as u32, r.total_line);
            let changes = state.changes.update(r.id, r.total_line, pace.pace);
            let signal = match (r.signal_at, r.signal_line, r.opening_line, r.deviation_percent) {
                (Some(at), Some(line), Some(opening), Some(dev)) => Some(SignalView {
                    triggered_at: at,
                    line,
                    opening_line: opening,
                    deviation_percent: dev,
                }),
                _ => None,
            };
            ActiveMatchResponse {
                id: r.id,
                teams: r.teams,
                tournament: r.tournament,
                game_clock: r.game_clock,
                period_length_min: r.period_length_min,
                period: r.period,
                score: r.score,
                total_points: r.total_points,
                total_line: r.total_line,
                recorded_at: r.recorded_at,
                pace,
                changes,
                signal,
            }
        })
        .collect();

    Ok(Json(matches))
}

async fn get_match_history(
    State(state): State<ApiState>,
    Path(match_id): Path<i64>,
) -> Result<Response, AppError> {
    let header: Option<(String, i64, String)> = sqlx::query_as(
        "SELECT teams, period_length_min, status FROM matches WHERE id = ?",
    )
    .bind(match_id)
    .fetch_optional(&state.pool)
    .await?;
    let Some((teams, period_length_min, status)) = header else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    let rows: Vec<(String, Option<String>, Option<String>, i64, Option<f64>, i64)> =
        sqlx::query_as(
            r#"
            SELECT game_clock, period, score, total_points, total_line, recorded_at
            FROM observations
            WHERE match_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(match_id)
        .fetch_all(&state.pool)
        .await?;

    let points = rows
        .into_iter()
        .map(|(game_clock, period, score, total_points, total_line, recorded_at)| {
            let pace =
                pace_view(&game_clock, total_points, period_length_min as u32, total_line).pace;
            HistoryPoint { game_clock, period, score, total_points, total_line, pace, recorded_at }
        })
        .collect();

    let body = HistoryResponse { match_id, teams, period_length_min, status, points };
    Ok(Json(body).into_response())
}

async fn get_finished_matches(
    State(state): State<ApiState>,
    Query(params): Query<FinishedQuery>,
) -> Result<Json<Vec<FinishedMatchResponse>>, AppError> {
    let since = params.since.unwrap_or(0);
    let until = params.until.unwrap_or(i64::MAX);
    let tournament = format!("%{}%", params.tournament.unwrap_or_default());
    let team = format!("%{}%", params.team.unwrap_or_default());
    let limit = params.limit.unwrap_or(100);

    let rows = sqlx::query_as::<_, FinishedRow>(
        r#"
        SELECT m.id, m.teams, m.tournament, m.updated_at AS finished_at,
               (SELECT total_line FROM observations
                WHERE match_id = m.id AND total_line IS NOT NULL
                ORDER BY id ASC LIMIT 1) AS opening_line,
               o.total_line AS final_line, o.score AS final_score, o.total_points AS final_points,
               ws.line AS signal_line, ws.deviation_percent AS signal_deviation,
               g.result, g.line_diff_percent
        FROM matches m
        LEFT JOIN observations o ON o.id = (SELECT MAX(id) FROM observations WHERE match_id = m.id)
        LEFT JOIN wager_signals ws ON ws.match_id = m.id
        LEFT JOIN gradings g ON g.match_id = m.id
        WHERE m.status = 'finished'
          AND m.updated_at >= ? AND m.updated_at <= ?
          AND IFNULL(m.tournament, '') LIKE ?
          AND m.teams LIKE ?
        ORDER BY m.updated_at DESC
        LIMIT ?
        "#,
    )
    .bind(since)
    .bind(until)
    .bind(tournament)
    .bind(team)
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    let matches = rows
        .into_iter()
        .map(|r| FinishedMatchResponse {
            id: r.id,
            teams: r.teams,
            tournament: r.tournament,
            finished_at: r.finished_at,
            opening_line: r.opening_line,
            final_line: r.final_line,
            final_score: r.final_score,
            final_points: r.final_points,
            signal_line: r.signal_line,
            signal_deviation_percent: r.signal_deviation,
            result: r.result,
            line_diff_percent: r.line_diff_percent,
        })
        .collect();

    Ok(Json(matches))
}

async fn get_stats_summary(
    State(state): State<ApiState>,
) -> Result<Json<SummaryResponse>, AppError> {
    let total_matches: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matches")
        .fetch_one(&state.pool)
        .await?;
    let active_matches: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM matches WHERE status = 'active'")
            .fetch_one(&state.pool)
            .await?;
    let signals: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wager_signals")
        .fetch_one(&state.pool)
        .await?;

    let (gradings, wins, losses, pushes, avg_deviation): (i64, i64, i64, i64, Option<f64>) =
        sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(result = 'WIN'), 0),
                   COALESCE(SUM(result = 'LOSE'), 0),
                   COALESCE(SUM(result = 'PUSH'), 0),
                   AVG(line_diff_percent)
            FROM gradings
            "#,
        )
        .fetch_one(&state.pool)
        .await?;

    Ok(Json(SummaryResponse {
        total_matches,
        active_matches,
        finished_matches: total_matches - active_matches,
        signals,
        gradings,
        wins,
        losses,
        pushes,
        avg_line_deviation_percent: avg_deviation,
    }))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySummary> {
    Json(state.latency.summary())
}

async fn get_health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "last_cycle_at_ns": state.health.last_cycle_at_ns(),
        "cycles_processed": state.health.cycles_processed(),
        "snapshots_received": state.health.snapshots_received(),
    }))
}
