//! Time-series recorder: appends one observation per distinct game clock,
//! forward-filling missing market fields from the last stored row.

use tracing::debug;

use crate::db::models::ObservationRow;
use crate::db::now_ns;
use crate::error::Result;
use crate::phase::derive_period;
use crate::signal::SignalEngine;
use crate::types::{RecordOutcome, Snapshot};

#[derive(Clone)]
pub struct Recorder {
    pool: sqlx::SqlitePool,
    signals: SignalEngine,
}

impl Recorder {
    pub fn new(pool: sqlx::SqlitePool, signals: SignalEngine) -> Self {
        Self { pool, signals }
    }

    /// Append an observation. Dedup is clock-based: when the incoming game
    /// clock equals the latest stored clock the poll cycle saw no progress
    /// and the row is skipped, whatever the wall-clock poll frequency.
    ///
    /// Market fields missing from the snapshot are filled from the most
    /// recent non-missing values, so every read path sees filled rows.
    /// A successful insert synchronously hands the filled line to the
    /// signal engine.
    pub async fn record(&self, match_id: i64, snap: &Snapshot) -> Result<RecordOutcome> {
        let last = sqlx::query_as::<_, ObservationRow>(
            "SELECT * FROM observations WHERE match_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(last) = &last {
            if last.game_clock == snap.clock {
                debug!(match_id, clock = %snap.clock, "duplicate clock, observation skipped");
                return Ok(RecordOutcome::SkippedDuplicate);
            }
        }

        // Forward fill: last known value wins over a missing current one.
        // Never backward: an old row is never touched.
        let total_line = snap.total_line.or(last.as_ref().and_then(|l| l.total_line));
        let under_price = snap.under_price.or(last.as_ref().and_then(|l| l.under_price));
        let over_price = snap.over_price.or(last.as_ref().and_then(|l| l.over_price));
        let home_price = snap.home_price.or(last.as_ref().and_then(|l| l.home_price));
        let away_price = snap.away_price.or(last.as_ref().and_then(|l| l.away_price));

        let period = derive_period(&snap.clock, snap.period_length_min).to_string();

        let insert = sqlx::query(
            r#"
            INSERT OR IGNORE INTO observations
                (match_id, game_clock, period, score, total_points,
                 total_line, under_price, over_price, home_price, away_price, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(match_id)
        .bind(&snap.clock)
        .bind(&period)
        .bind(&snap.score)
        .bind(snap.total_points)
        .bind(total_line)
        .bind(under_price)
        .bind(over_price)
        .bind(home_price)
        .bind(away_price)
        .bind(now_ns())
        .execute(&self.pool)
        .await?;

        // A clock can reappear after intervening rows (scoreboard pause);
        // the UNIQUE(match_id, game_clock) constraint absorbs it as a no-op.
        if insert.rows_affected() == 0 {
            return Ok(RecordOutcome::SkippedDuplicate);
        }

        let signal = self.signals.evaluate(match_id, &snap.clock, total_line).await?;
        Ok(RecordOutcome::Inserted { signal_fired: signal.is_some() })
    }
}
