//! Signal engine: fires at most one wager signal per match when the market
//! total line moves past the configured threshold above its opening value.

use tracing::info;

use crate::db::models::SignalRow;
use crate::db::now_ns;
use crate::error::Result;

/// Per-match one-shot state machine. The persisted signal row *is* the
/// state: a match with a row is terminal-signaled and never fires again.
#[derive(Clone)]
pub struct SignalEngine {
    pool: sqlx::SqlitePool,
    trigger_percent: f64,
}

impl SignalEngine {
    pub fn new(pool: sqlx::SqlitePool, trigger_percent: f64) -> Self {
        Self { pool, trigger_percent }
    }

    /// Evaluate the freshly recorded observation. Fires iff no signal exists
    /// for the match yet, the line has been observed at least twice (an
    /// opening value by insertion order plus the current one), and the
    /// current line deviates upward from the opening by more than the
    /// trigger threshold.
    pub async fn evaluate(
        &self,
        match_id: i64,
        clock: &str,
        current_line: Option<f64>,
    ) -> Result<Option<SignalRow>> {
        let Some(current) = current_line else {
            return Ok(None);
        };

        let already_signaled: Option<i64> =
            sqlx::query_scalar("SELECT id FROM wager_signals WHERE match_id = ?")
                .bind(match_id)
                .fetch_optional(&self.pool)
                .await?;
        if already_signaled.is_some() {
            return Ok(None);
        }

        // The opening line is the first non-missing line by insertion order.
        // Requiring a second line observation keeps a match whose very first
        // snapshot already shows an inflated line from instantly signaling.
        let line_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM observations WHERE match_id = ? AND total_line IS NOT NULL",
        )
        .bind(match_id)
        .fetch_one(&self.pool)
        .await?;
        if line_count < 2 {
            return Ok(None);
        }

        let opening: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT total_line FROM observations
            WHERE match_id = ? AND total_line IS NOT NULL
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(opening) = opening.filter(|o| *o > 0.0) else {
            return Ok(None);
        };

        let deviation = (current - opening) / opening * 100.0;
        if deviation <= self.trigger_percent {
            return Ok(None);
        }

        let triggered_at = now_ns();
        let insert = sqlx::query(
            r#"
            INSERT OR IGNORE INTO wager_signals
                (match_id, triggered_at, trigger_clock, line, opening_line, deviation_percent)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(match_id)
        .bind(triggered_at)
        .bind(clock)
        .bind(current)
        .bind(opening)
        .bind(deviation)
        .execute(&self.pool)
        .await?;

        // rows_affected = 0 means another writer won the race — the UNIQUE
        // constraint absorbed the duplicate, nothing fired here.
        if insert.rows_affected() == 0 {
            return Ok(None);
        }

        info!(
            match_id,
            line = current,
            opening_line = opening,
            deviation_percent = deviation,
            "SIGNAL | match {match_id} line {current} is {deviation:.1}% above opening {opening}",
        );

        Ok(Some(SignalRow {
            id: insert.last_insert_rowid(),
            match_id,
            triggered_at,
            trigger_clock: Some(clock.to_string()),
            line: current,
            opening_line: opening,
            deviation_percent: deviation,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_util::test_pool;

    async fn seed_match(pool: &sqlx::SqlitePool) -> i64 {
        sqlx::query(
            "INSERT INTO matches (teams, tournament, created_at, updated_at) VALUES (?, ?, 0, 0)",
        )
        .bind("Alpha - Beta")
        .bind("Euroleague")
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    async fn seed_observation(pool: &sqlx::SqlitePool, match_id: i64, clock: &str, line: Option<f64>) {
        sqlx::query(
            r#"
            INSERT INTO observations (match_id, game_clock, total_points, total_line, recorded_at)
            VALUES (?, ?, 0, ?, 0)
            "#,
        )
        .bind(match_id)
        .bind(clock)
        .bind(line)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn fires_above_threshold_not_at_or_below() {
        let pool = test_pool().await;
        let match_id = seed_match(&pool).await;
        let engine = SignalEngine::new(pool.clone(), 15.0);

        seed_observation(&pool, match_id, "02:00", Some(100.0)).await;

        // 14% above opening — no signal.
        seed_observation(&pool, match_id, "05:00", Some(114.0)).await;
        let fired = engine.evaluate(match_id, "05:00", Some(114.0)).await.unwrap();
        assert!(fired.is_none());

        // 16% above opening — fires.
        seed_observation(&pool, match_id, "08:00", Some(116.0)).await;
        let fired = engine.evaluate(match_id, "08:00", Some(116.0)).await.unwrap();
        let signal = fired.expect("signal should fire at 16%");
        assert_eq!(signal.opening_line, 100.0);
        assert_eq!(signal.line, 116.0);
        assert!((signal.deviation_percent - 16.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn at_most_one_signal_per_match() {
        let pool = test_pool().await;
        let match_id = seed_match(&pool).await;
        let engine = SignalEngine::new(pool.clone(), 15.0);

        seed_observation(&pool, match_id, "02:00", Some(100.0)).await;
        seed_observation(&pool, match_id, "05:00", Some(120.0)).await;
        assert!(engine.evaluate(match_id, "05:00", Some(120.0)).await.unwrap().is_some());

        // Even larger deviation later — the state machine is terminal.
        seed_observation(&pool, match_id, "09:00", Some(140.0)).await;
        assert!(engine.evaluate(match_id, "09:00", Some(140.0)).await.unwrap().is_none());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wager_signals WHERE match_id = ?")
            .bind(match_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn needs_two_line_observations_before_firing() {
        let pool = test_pool().await;
        let match_id = seed_match(&pool).await;
        let engine = SignalEngine::new(pool.clone(), 15.0);

        // Single inflated line with no opening reference — must not fire.
        seed_observation(&pool, match_id, "02:00", Some(200.0)).await;
        assert!(engine.evaluate(match_id, "02:00", Some(200.0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_line_never_fires() {
        let pool = test_pool().await;
        let match_id = seed_match(&pool).await;
        let engine = SignalEngine::new(pool.clone(), 15.0);

        seed_observation(&pool, match_id, "02:00", None).await;
        assert!(engine.evaluate(match_id, "02:00", None).await.unwrap().is_none());
    }
}
