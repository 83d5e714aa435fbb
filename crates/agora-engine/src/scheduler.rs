use crate::error::Result;
use crate::orchestrator::Orchestrator;
use agora_store::JobKind;
use agora_types::ScheduleMode;
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Daily schedule mode: at 00:00 UTC each day, start a tournament with the
/// next epoch number — unless one is still live. Manual mode leaves starts
/// to the administrative trigger.
pub struct DailyScheduler {
    orchestrator: Arc<Orchestrator>,
    mode: ScheduleMode,
    shutdown: Arc<AtomicBool>,
}

impl DailyScheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, mode: ScheduleMode) -> Self {
        let shutdown = orchestrator.shutdown_handle();
        Self {
            orchestrator,
            mode,
            shutdown,
        }
    }

    /// Next 00:00 UTC strictly after `now`.
    pub fn next_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = NaiveTime::from_hms_opt(0, 0, 0).expect("valid time");
        (now + ChronoDuration::days(1))
            .date_naive()
            .and_time(midnight)
            .and_utc()
    }

    /// One scheduling decision. Factored out of the sleep loop so it is
    /// directly testable.
    pub async fn tick(&self) -> Result<()> {
        if self.orchestrator.store().active_tournament().await?.is_some() {
            debug!("tournament still live, skipping daily start");
            return Ok(());
        }
        let next_epoch = self
            .orchestrator
            .store()
            .latest_epoch_number()
            .await?
            .map(|n| n + 1)
            .unwrap_or(1);
        info!(epoch = next_epoch, "🌅 daily schedule starting tournament");
        self.orchestrator
            .queue()
            .enqueue_now(JobKind::StartTournament {
                epoch_number: next_epoch,
            })
            .await?;
        Ok(())
    }

    pub async fn run(&self) {
        if self.mode != ScheduleMode::Daily {
            info!("manual schedule mode, daily scheduler idle");
            return;
        }

        while !self.shutdown.load(Ordering::Relaxed) {
            let now = Utc::now();
            let wake_at = Self::next_midnight(now);
            let sleep_for = (wake_at - now)
                .to_std()
                .unwrap_or(std::time::Duration::from_secs(1));
            debug!(wake_at = %wake_at, "scheduler sleeping until next UTC midnight");
            tokio::time::sleep(sleep_for).await;

            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            if let Err(e) = self.tick().await {
                tracing::error!(error = %e, "daily scheduling tick failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 13, 45, 10).unwrap();
        let next = DailyScheduler::next_midnight(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_next_midnight_just_before_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 23, 59, 59).unwrap();
        let next = DailyScheduler::next_midnight(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_next_midnight_at_midnight_is_tomorrow() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let next = DailyScheduler::next_midnight(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap());
    }
}
