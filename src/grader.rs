//! Completion grading: settles each signaled match exactly once against its
//! final total, plus the rescan pass that recovers matches the lifecycle
//! fast path missed.

use std::time::Duration;
use tracing::{error, info};

use crate::config::RESCAN_INTERVAL_SECS;
use crate::db::now_ns;
use crate::error::Result;
use crate::phase::is_fully_completed;
use crate::types::{BetResult, RescanReport};

#[derive(Clone)]
pub struct Grader {
    pool: sqlx::SqlitePool,
}

impl Grader {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Grade a match against its last stored observation. No-op (None)
    /// when the match carries no signal, already has a grading, or has no
    /// observations to settle against. Safe to call repeatedly.
    ///
    /// The tracked position is an under on the total: final points below
    /// the signal line win, above lose, equality pushes.
    pub async fn grade(&self, match_id: i64) -> Result<Option<BetResult>> {
        let signal: Option<(i64, f64, f64)> = sqlx::query_as(
            "SELECT id, line, opening_line FROM wager_signals WHERE match_id = ?",
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some((signal_id, line, opening_line)) = signal else {
            return Ok(None);
        };

        let graded: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM gradings WHERE match_id = ? AND signal_id = ?",
        )
        .bind(match_id)
        .bind(signal_id)
        .fetch_optional(&self.pool)
        .await?;
        if graded.is_some() {
            return Ok(None);
        }

        let final_obs: Option<(Option<String>, i64)> = sqlx::query_as(
            "SELECT score, total_points FROM observations WHERE match_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some((final_score, final_points)) = final_obs else {
            return Ok(None);
        };

        let result = if (final_points as f64) < line {
            BetResult::Win
        } else if (final_points as f64) > line {
            BetResult::Lose
        } else {
            BetResult::Push
        };

        let line_diff = line - opening_line;
        let line_diff_percent = if opening_line > 0.0 {
            (line - opening_line) / opening_line * 100.0
        } else {
            0.0
        };

        let insert = sqlx::query(
            r#"
            INSERT OR IGNORE INTO gradings
                (match_id, signal_id, final_score, final_points, result,
                 line_diff, line_diff_percent, graded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(match_id)
        .bind(signal_id)
        .bind(&final_score)
        .bind(final_points)
        .bind(result.as_str())
        .bind(line_diff)
        .bind(line_diff_percent)
        .bind(now_ns())
        .execute(&self.pool)
        .await?;

        if insert.rows_affected() == 0 {
            return Ok(None);
        }

        info!(
            match_id,
            final_points,
            line,
            result = %result,
            "GRADED | match {match_id}: {final_points} pts vs line {line} → {result}",
        );
        Ok(Some(result))
    }

    /// Re-grade every finished match that carries a signal but no grading.
    /// Authoritative recovery for matches that vanished from the feed at
    /// the completion boundary or were transitioned across a restart.
    pub async fn rescan(&self) -> Result<RescanReport> {
        let candidates: Vec<(i64, Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT m.id, m.game_clock, m.period_length_min
            FROM matches m
            JOIN wager_signals ws ON ws.match_id = m.id
            LEFT JOIN gradings g ON g.match_id = m.id
            WHERE m.status = 'finished' AND g.id IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut report = RescanReport { scanned: candidates.len() as u64, graded: 0 };

        for (match_id, clock, period_length_min) in candidates {
            let completed = clock
                .as_deref()
                .map(|c| is_fully_completed(c, period_length_min as u32))
                .unwrap_or(false);
            if !completed {
                continue;
            }
            if self.grade(match_id).await?.is_some() {
                report.graded += 1;
            }
        }

        info!(
            scanned = report.scanned,
            graded = report.graded,
            "Rescan complete: graded {}/{} ungraded finished matches",
            report.graded,
            report.scanned,
        );
        Ok(report)
    }
}

/// Background task that runs the rescan pass on its own schedule, so
/// recovery never depends on the ingestion path staying alive.
pub struct RescanScheduler {
    grader: Grader,
}

impl RescanScheduler {
    pub fn new(grader: Grader) -> Self {
        Self { grader }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(Duration::from_secs(RESCAN_INTERVAL_SECS));
        ticker.tick().await; // consume immediate first tick

        loop {
            ticker.tick().await;
            if let Err(e) = self.grader.rescan().await {
                error!("Rescan failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_util::test_pool;

    async fn seed_match(pool: &sqlx::SqlitePool, teams: &str, status: &str, clock: &str) -> i64 {
        sqlx::query(
            r#"
            INSERT INTO matches (teams, tournament, game_clock, period_length_min, status, created_at, updated_at)
            VALUES (?, 'Euroleague', ?, 40, ?, 0, 0)
            "#,
        )
        .bind(teams)
        .bind(clock)
        .bind(status)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    async fn seed_observation(pool: &sqlx::SqlitePool, match_id: i64, clock: &str, points: i64) {
        sqlx::query(
            r#"
            INSERT INTO observations (match_id, game_clock, score, total_points, recorded_at)
            VALUES (?, ?, '75:73', ?, 0)
            "#,
        )
        .bind(match_id)
        .bind(clock)
        .bind(points)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn seed_signal(pool: &sqlx::SqlitePool, match_id: i64, line: f64, opening: f64) {
        sqlx::query(
            r#"
            INSERT INTO wager_signals (match_id, triggered_at, line, opening_line, deviation_percent)
            VALUES (?, 0, ?, ?, 0.0)
            "#,
        )
        .bind(match_id)
        .bind(line)
        .bind(opening)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn settlement_around_the_line() {
        let pool = test_pool().await;
        let grader = Grader::new(pool.clone());

        for (points, expected) in [(148, BetResult::Win), (152, BetResult::Lose), (150, BetResult::Push)] {
            let match_id = seed_match(&pool, &format!("Match {points}"), "finished", "40:00").await;
            seed_signal(&pool, match_id, 150.0, 130.0).await;
            seed_observation(&pool, match_id, "40:00", points).await;

            let result = grader.grade(match_id).await.unwrap();
            assert_eq!(result, Some(expected), "final points {points}");
        }
    }

    #[tokio::test]
    async fn grade_is_a_noop_without_a_signal_and_idempotent_with_one() {
        let pool = test_pool().await;
        let grader = Grader::new(pool.clone());

        let unsignaled = seed_match(&pool, "No Signal", "finished", "40:00").await;
        seed_observation(&pool, unsignaled, "40:00", 160).await;
        assert_eq!(grader.grade(unsignaled).await.unwrap(), None);

        let signaled = seed_match(&pool, "Signaled", "finished", "40:00").await;
        seed_signal(&pool, signaled, 150.0, 130.0).await;
        seed_observation(&pool, signaled, "40:00", 148).await;

        assert_eq!(grader.grade(signaled).await.unwrap(), Some(BetResult::Win));
        // Second call must not create a second grading.
        assert_eq!(grader.grade(signaled).await.unwrap(), None);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM gradings WHERE match_id = ?")
            .bind(signaled)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn rescan_grades_once_and_reports_zero_on_second_run() {
        let pool = test_pool().await;
        let grader = Grader::new(pool.clone());

        // Completed match with a signal but no grading — the fast path missed it.
        let missed = seed_match(&pool, "Missed", "finished", "39:40").await;
        seed_signal(&pool, missed, 150.0, 130.0).await;
        seed_observation(&pool, missed, "39:40", 144).await;

        // Vanished mid-game: finished status but clock short of completion.
        let vanished = seed_match(&pool, "Vanished", "finished", "22:10").await;
        seed_signal(&pool, vanished, 150.0, 130.0).await;
        seed_observation(&pool, vanished, "22:10", 80).await;

        let first = grader.rescan().await.unwrap();
        assert_eq!(first.scanned, 2);
        assert_eq!(first.graded, 1);

        let second = grader.rescan().await.unwrap();
        assert_eq!(second.graded, 0, "second rescan must grade nothing new");

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM gradings")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(total, 1);
    }
}
