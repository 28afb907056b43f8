use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc};

use crate::config::ScheduleConfig;
use crate::notifier::Notifier;

/// A wall-clock time of day in a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct DailySchedule {
    target: NaiveTime,
    offset: FixedOffset,
    poll_interval: Duration,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32, offset: FixedOffset, poll_interval: Duration) -> Result<Self> {
        let target = NaiveTime::from_hms_opt(hour, minute, 0)
            .with_context(|| format!("Invalid target time {hour:02}:{minute:02}"))?;
        Ok(Self {
            target,
            offset,
            poll_interval: poll_interval.max(Duration::from_secs(1)),
        })
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        let offset = FixedOffset::east_opt(config.utc_offset_hours * 3600)
            .with_context(|| format!("Invalid UTC offset {}", config.utc_offset_hours))?;
        Self::new(
            config.hour,
            config.minute,
            offset,
            Duration::from_secs(config.poll_interval_secs),
        )
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// First instant strictly after `now` at the target local time.
    pub fn next_occurrence(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.offset);
        let today = local.date_naive().and_time(self.target);
        let candidate = if today > local.naive_local() {
            today
        } else {
            today + Days::new(1)
        };
        // Fixed offsets have no gaps or folds, so this is always single.
        candidate
            .and_local_timezone(self.offset)
            .single()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(now + chrono::Duration::days(1))
    }

    fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    fn reached(&self, now: DateTime<Utc>) -> bool {
        now.with_timezone(&self.offset).time() >= self.target
    }

    /// Whether the target minute is already over, comparing hour and minute only.
    fn passed(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.offset);
        (local.hour(), local.minute()) > (self.target.hour(), self.target.minute())
    }
}

/// Fires at most once per local day, at or after the target time.
#[derive(Debug)]
pub struct Trigger {
    schedule: DailySchedule,
    last_fired: Option<NaiveDate>,
}

impl Trigger {
    /// A start after today's target minute waits for tomorrow; a start
    /// within that minute still fires.
    pub fn new(schedule: DailySchedule, now: DateTime<Utc>) -> Self {
        let last_fired = schedule
            .passed(now)
            .then(|| schedule.local_date(now));
        Self {
            schedule,
            last_fired,
        }
    }

    pub fn schedule(&self) -> &DailySchedule {
        &self.schedule
    }

    /// Returns `true` (and records the day) when a firing is due.
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        let today = self.schedule.local_date(now);
        if self.last_fired == Some(today) || !self.schedule.reached(now) {
            return false;
        }
        self.last_fired = Some(today);
        true
    }

    /// How long to stay idle before the next check.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        let until_next = (self.schedule.next_occurrence(now) - now)
            .to_std()
            .unwrap_or(Duration::ZERO);
        until_next.min(self.schedule.poll_interval)
    }
}

/// Run the trigger loop until `shutdown` resolves. Never fails on a bad firing.
pub async fn run<S>(mut trigger: Trigger, notifier: &Notifier, shutdown: S)
where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    tracing::info!(
        "Scheduler started; next message at {}",
        trigger
            .schedule()
            .next_occurrence(Utc::now())
            .with_timezone(&trigger.schedule().offset())
    );

    loop {
        let now = Utc::now();
        tracing::trace!("Checking schedule at {now}");
        if trigger.poll(now) {
            tracing::info!("Firing daily message");
            match notifier.fire(now).await {
                Ok(()) => tracing::info!("Daily message sent"),
                Err(e) => tracing::error!("Failed to send daily message: {e:#}"),
            }
            tracing::info!(
                "Next message at {}",
                trigger
                    .schedule()
                    .next_occurrence(Utc::now())
                    .with_timezone(&trigger.schedule().offset())
            );
        }

        let idle = trigger.idle_for(Utc::now());
        tracing::debug!("Idle for {}s", idle.as_secs());
        tokio::select! {
            _ = tokio::time::sleep(idle) => {}
            _ = &mut shutdown => {
                tracing::info!("Scheduler stopped");
                return;
            }
        }
    }
}
