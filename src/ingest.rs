//! Poll-cycle orchestration: normalize → lifecycle sync → resolve → record.
//! One cycle corresponds to one batch of snapshots from the upstream scraper.

use std::collections::HashSet;
use tracing::{debug, error, info};

use crate::grader::Grader;
use crate::normalize::normalize;
use crate::recorder::Recorder;
use crate::registry::MatchRegistry;
use crate::types::{IngestReport, RawSnapshot, RecordOutcome, Snapshot};

pub struct IngestService {
    registry: MatchRegistry,
    recorder: Recorder,
    grader: Grader,
    banned_tournaments: Vec<String>,
}

impl IngestService {
    pub fn new(
        registry: MatchRegistry,
        recorder: Recorder,
        grader: Grader,
        banned_tournaments: Vec<String>,
    ) -> Self {
        Self { registry, recorder, grader, banned_tournaments }
    }

    /// Process one poll cycle. Storage errors are isolated per match: the
    /// affected snapshot is dropped with an error log and the rest of the
    /// batch continues. Nothing here retries — retry policy belongs to the
    /// upstream loop.
    pub async fn process_cycle(&self, raws: Vec<RawSnapshot>) -> IngestReport {
        let mut report = IngestReport { received: raws.len() as u64, ..Default::default() };

        // Normalize the whole batch first so the lifecycle diff sees the
        // complete observed identity set before any rows are written.
        let mut snapshots: Vec<Snapshot> = Vec::with_capacity(raws.len());
        let mut observed: HashSet<String> = HashSet::new();
        for raw in &raws {
            let Some(snap) = normalize(raw) else {
                report.dropped += 1;
                continue;
            };
            if self.banned_tournaments.iter().any(|b| b == &snap.tournament) {
                debug!(teams = %snap.teams, tournament = %snap.tournament, "banned tournament, snapshot dropped");
                report.dropped += 1;
                continue;
            }
            observed.insert(snap.teams.clone());
            snapshots.push(snap);
        }

        match self.registry.sync_lifecycle(&observed, &self.grader).await {
            Ok(sync) => {
                report.transitioned = sync.transitioned;
                report.graded = sync.completed;
            }
            Err(e) => error!("lifecycle sync failed: {e}"),
        }

        for snap in &snapshots {
            let resolution = match self.registry.resolve(snap).await {
                Ok(r) => r,
                Err(e) => {
                    error!(teams = %snap.teams, "resolve failed, snapshot dropped: {e}");
                    report.dropped += 1;
                    continue;
                }
            };
            if resolution.is_new {
                report.new_matches += 1;
            }
            if resolution.finished {
                report.dropped += 1;
                continue;
            }

            match self.recorder.record(resolution.match_id, snap).await {
                Ok(RecordOutcome::Inserted { signal_fired }) => {
                    report.recorded += 1;
                    if signal_fired {
                        report.signals_fired += 1;
                    }
                }
                Ok(RecordOutcome::SkippedDuplicate) => report.skipped_duplicates += 1,
                Err(e) => {
                    error!(
                        match_id = resolution.match_id,
                        teams = %snap.teams,
                        "record failed, this cycle's update dropped: {e}",
                    );
                    report.dropped += 1;
                }
            }
        }

        info!(
            received = report.received,
            recorded = report.recorded,
            skipped = report.skipped_duplicates,
            new_matches = report.new_matches,
            signals = report.signals_fired,
            transitioned = report.transitioned,
            graded = report.graded,
            "Cycle complete: {}/{} recorded, {} new, {} signals",
            report.recorded,
            report.received,
            report.new_matches,
            report.signals_fired,
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_util::test_pool;
    use crate::signal::SignalEngine;

    fn raw(teams: &str, clock: &str, score: &str, total: &str) -> RawSnapshot {
        RawSnapshot {
            teams: teams.to_string(),
            tournament: Some("Euroleague".to_string()),
            clock: clock.to_string(),
            score: Some(score.to_string()),
            total: Some(total.to_string()),
            under: Some("1,85".to_string()),
            over: Some("1.95".to_string()),
            home: None,
            away: None,
            format: None,
        }
    }

    async fn service(pool: &sqlx::SqlitePool) -> IngestService {
        IngestService::new(
            MatchRegistry::new(pool.clone()),
            Recorder::new(pool.clone(), SignalEngine::new(pool.clone(), 15.0)),
            Grader::new(pool.clone()),
            vec!["Friendlies".to_string()],
        )
    }

    #[tokio::test]
    async fn full_cycle_registers_and_records() {
        let pool = test_pool().await;
        let svc = service(&pool).await;

        let report = svc
            .process_cycle(vec![
                raw("Alpha - Beta", "05:00", "10:12", "160.5"),
                raw("Gamma - Delta", "11:20", "24:20", "-"),
            ])
            .await;

        assert_eq!(report.received, 2);
        assert_eq!(report.new_matches, 2);
        assert_eq!(report.recorded, 2);

        let matches: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matches")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(matches, 2);
    }

    #[tokio::test]
    async fn repeated_cycle_with_same_clock_is_deduplicated() {
        let pool = test_pool().await;
        let svc = service(&pool).await;

        svc.process_cycle(vec![raw("Alpha - Beta", "05:00", "10:12", "160.5")]).await;
        let second = svc.process_cycle(vec![raw("Alpha - Beta", "05:00", "10:12", "160.5")]).await;

        assert_eq!(second.recorded, 0);
        assert_eq!(second.skipped_duplicates, 1);
    }

    #[tokio::test]
    async fn banned_tournament_is_dropped() {
        let pool = test_pool().await;
        let svc = service(&pool).await;

        let mut snapshot = raw("Alpha - Beta", "05:00", "10:12", "160.5");
        snapshot.tournament = Some("Friendlies".to_string());
        let report = svc.process_cycle(vec![snapshot]).await;

        assert_eq!(report.dropped, 1);
        assert_eq!(report.recorded, 0);
    }

    #[tokio::test]
    async fn vanished_match_transitions_on_next_cycle() {
        let pool = test_pool().await;
        let svc = service(&pool).await;

        svc.process_cycle(vec![
            raw("Alpha - Beta", "39:30", "70:72", "160.5"),
            raw("Gamma - Delta", "11:20", "24:20", "150.0"),
        ])
        .await;

        // Alpha - Beta disappears from the feed.
        let report = svc.process_cycle(vec![raw("Gamma - Delta", "11:45", "26:22", "150.0")]).await;
        assert_eq!(report.transitioned, 1);

        let status: String = sqlx::query_scalar("SELECT status FROM matches WHERE teams = ?")
            .bind("Alpha - Beta")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(status, "finished");
    }

    #[tokio::test]
    async fn signal_then_completion_grades_on_the_fast_path() {
        let pool = test_pool().await;
        let svc = service(&pool).await;

        // Opening line, then a 25% line move fires the signal.
        svc.process_cycle(vec![raw("Alpha - Beta", "05:00", "10:12", "120.0")]).await;
        let fired = svc.process_cycle(vec![raw("Alpha - Beta", "15:00", "30:32", "150.0")]).await;
        assert_eq!(fired.signals_fired, 1);

        // Final snapshot at the buzzer, then the match vanishes.
        svc.process_cycle(vec![raw("Alpha - Beta", "39:40", "71:72", "150.0")]).await;
        let last = svc.process_cycle(vec![]).await;
        assert_eq!(last.transitioned, 1);
        assert_eq!(last.graded, 1);

        let result: String = sqlx::query_scalar(
            "SELECT result FROM gradings g JOIN matches m ON m.id = g.match_id WHERE m.teams = ?",
        )
        .bind("Alpha - Beta")
        .fetch_one(&pool)
        .await
        .unwrap();
        // 143 final points under the 150 line.
        assert_eq!(result, "WIN");
    }
}
