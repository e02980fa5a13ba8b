//! Match registry: resolves snapshots to a stable match identity and owns
//! the active → finished lifecycle.

use std::collections::HashSet;
use tracing::{debug, error, info};

use crate::config::STALENESS_WINDOW_SECS;
use crate::db::now_ns;
use crate::error::Result;
use crate::grader::Grader;
use crate::phase::is_fully_completed;
use crate::types::{MatchStatus, Resolution, Snapshot, SyncReport};

#[derive(Clone)]
pub struct MatchRegistry {
    pool: sqlx::SqlitePool,
}

impl MatchRegistry {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up a snapshot by its team-pairing identity. Inserts an active
    /// match on first sight; otherwise refreshes the mutable fields (clock,
    /// format, updated_at). Finished is terminal: a snapshot matching a
    /// finished match is reported as such and left untouched.
    pub async fn resolve(&self, snap: &Snapshot) -> Result<Resolution> {
        let existing: Option<(i64, String)> =
            sqlx::query_as("SELECT id, status FROM matches WHERE teams = ?")
                .bind(&snap.teams)
                .fetch_optional(&self.pool)
                .await?;

        let now = now_ns();

        if let Some((match_id, status)) = existing {
            if status == MatchStatus::Finished.as_str() {
                debug!(match_id, teams = %snap.teams, "snapshot for finished match ignored");
                return Ok(Resolution { match_id, is_new: false, finished: true });
            }

            sqlx::query(
                "UPDATE matches SET game_clock = ?, period_length_min = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&snap.clock)
            .bind(snap.period_length_min)
            .bind(now)
            .bind(match_id)
            .execute(&self.pool)
            .await?;

            return Ok(Resolution { match_id, is_new: false, finished: false });
        }

        let insert = sqlx::query(
            r#"
            INSERT INTO matches (teams, tournament, game_clock, period_length_min, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&snap.teams)
        .bind(&snap.tournament)
        .bind(&snap.clock)
        .bind(snap.period_length_min)
        .bind(MatchStatus::Active.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let match_id = insert.last_insert_rowid();
        info!(match_id, teams = %snap.teams, tournament = %snap.tournament, "new match registered");
        Ok(Resolution { match_id, is_new: true, finished: false })
    }

    /// Diff the currently observed identity set against recently updated
    /// active matches. Anything absent from the feed flips to finished; if
    /// its last clock already satisfies the completion predicate the grader
    /// runs synchronously. That coupling is a fast path only — a match that
    /// vanishes before crossing the completion threshold is picked up later
    /// by the rescan pass.
    pub async fn sync_lifecycle(
        &self,
        observed: &HashSet<String>,
        grader: &Grader,
    ) -> Result<SyncReport> {
        let now = now_ns();
        let cutoff = now - (STALENESS_WINDOW_SECS as i64) * 1_000_000_000;

        let recent: Vec<(i64, String, Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT id, teams, game_clock, period_length_min
            FROM matches
            WHERE status = 'active' AND updated_at > ?
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut report = SyncReport::default();

        for (match_id, teams, clock, period_length_min) in recent {
            if observed.contains(&teams) {
                continue;
            }

            sqlx::query("UPDATE matches SET status = ?, updated_at = ? WHERE id = ?")
                .bind(MatchStatus::Finished.as_str())
                .bind(now)
                .bind(match_id)
                .execute(&self.pool)
                .await?;
            report.transitioned += 1;
            info!(match_id, teams = %teams, clock = clock.as_deref().unwrap_or("-"), "match finished");

            let completed = clock
                .as_deref()
                .map(|c| is_fully_completed(c, period_length_min as u32))
                .unwrap_or(false);
            if !completed {
                continue;
            }

            // A grading failure only loses the fast path for this match;
            // the rest of the pass continues and rescan recovers it.
            match grader.grade(match_id).await {
                Ok(Some(_)) => report.completed += 1,
                Ok(None) => {}
                Err(e) => error!(match_id, "fast-path grading failed: {e}"),
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_util::test_pool;

    fn snapshot(teams: &str, clock: &str) -> Snapshot {
        Snapshot {
            teams: teams.to_string(),
            tournament: "Euroleague".to_string(),
            clock: clock.to_string(),
            period_length_min: 40,
            score: "-".to_string(),
            total_points: 0,
            total_line: None,
            under_price: None,
            over_price: None,
            home_price: None,
            away_price: None,
        }
    }

    #[tokio::test]
    async fn resolve_inserts_then_updates() {
        let pool = test_pool().await;
        let registry = MatchRegistry::new(pool.clone());

        let first = registry.resolve(&snapshot("Alpha - Beta", "02:00")).await.unwrap();
        assert!(first.is_new);

        let second = registry.resolve(&snapshot("Alpha - Beta", "03:30")).await.unwrap();
        assert!(!second.is_new);
        assert_eq!(second.match_id, first.match_id);

        let clock: Option<String> = sqlx::query_scalar("SELECT game_clock FROM matches WHERE id = ?")
            .bind(first.match_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(clock.as_deref(), Some("03:30"));
    }

    #[tokio::test]
    async fn finished_is_terminal_on_resolve() {
        let pool = test_pool().await;
        let registry = MatchRegistry::new(pool.clone());

        let res = registry.resolve(&snapshot("Alpha - Beta", "39:50")).await.unwrap();
        sqlx::query("UPDATE matches SET status = 'finished' WHERE id = ?")
            .bind(res.match_id)
            .execute(&pool)
            .await
            .unwrap();

        // The match reappears in the feed — it must not reopen.
        let again = registry.resolve(&snapshot("Alpha - Beta", "00:10")).await.unwrap();
        assert!(again.finished);

        let status: String = sqlx::query_scalar("SELECT status FROM matches WHERE id = ?")
            .bind(res.match_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(status, "finished");
    }

    #[tokio::test]
    async fn sync_finishes_absent_matches_and_grades_completed_ones() {
        let pool = test_pool().await;
        let registry = MatchRegistry::new(pool.clone());
        let grader = Grader::new(pool.clone());

        // Completed match with a signal: should transition AND grade.
        let done = registry.resolve(&snapshot("Done - Match", "39:30")).await.unwrap();
        sqlx::query(
            "INSERT INTO wager_signals (match_id, triggered_at, line, opening_line, deviation_percent) VALUES (?, 0, 150.0, 130.0, 15.4)",
        )
        .bind(done.match_id)
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO observations (match_id, game_clock, score, total_points, recorded_at) VALUES (?, '39:30', '70:72', 142, 0)",
        )
        .bind(done.match_id)
        .execute(&pool)
        .await
        .unwrap();

        // Vanishes mid-game: transitions but is not graded by the fast path.
        let gone = registry.resolve(&snapshot("Gone - Early", "18:00")).await.unwrap();

        // Still present in the feed: untouched.
        registry.resolve(&snapshot("Live - Match", "21:00")).await.unwrap();

        let observed: HashSet<String> = ["Live - Match".to_string()].into_iter().collect();
        let report = registry.sync_lifecycle(&observed, &grader).await.unwrap();
        assert_eq!(report.transitioned, 2);
        assert_eq!(report.completed, 1);

        let statuses: Vec<(i64, String)> = sqlx::query_as("SELECT id, status FROM matches ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
        for (id, status) in statuses {
            if id == done.match_id || id == gone.match_id {
                assert_eq!(status, "finished");
            } else {
                assert_eq!(status, "active");
            }
        }
    }

    #[tokio::test]
    async fn sync_ignores_stale_matches() {
        let pool = test_pool().await;
        let registry = MatchRegistry::new(pool.clone());
        let grader = Grader::new(pool.clone());

        let res = registry.resolve(&snapshot("Old - Match", "12:00")).await.unwrap();
        // Push updated_at outside the staleness window.
        let old = now_ns() - 5 * 3600 * 1_000_000_000;
        sqlx::query("UPDATE matches SET updated_at = ? WHERE id = ?")
            .bind(old)
            .bind(res.match_id)
            .execute(&pool)
            .await
            .unwrap();

        let report = registry.sync_lifecycle(&HashSet::new(), &grader).await.unwrap();
        assert_eq!(report.transitioned, 0);

        let status: String = sqlx::query_scalar("SELECT status FROM matches WHERE id = ?")
            .bind(res.match_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(status, "active");
    }
}
