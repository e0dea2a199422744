// src/ingest/scheduler.rs
//! Fixed local-time daily scheduler.
//!
//! The wait is recomputed from the wall clock before every cycle, so a slow action or
//! a DST switch never makes the schedule drift.

use std::fmt::Display;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use metrics::{counter, gauge};
use tokio_util::sync::CancellationToken;

use crate::error::ScheduleError;

/// Resolve an IANA zone name such as `America/New_York`.
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    Tz::from_str(name.trim()).map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}

/// Wait from `now` until the next `hour:minute:00` in `zone`.
pub fn duration_until_next(
    zone: &str,
    hour: u32,
    minute: u32,
    now: DateTime<Utc>,
) -> Result<Duration, ScheduleError> {
    Ok(DailySchedule::new(zone, hour, minute)?.duration_until_next(now))
}

/// A validated "every day at hh:mm in zone" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    zone: Tz,
    hour: u32,
    minute: u32,
}

impl DailySchedule {
    pub fn new(zone: &str, hour: u32, minute: u32) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::InvalidTime { hour, minute });
        }
        Ok(Self {
            zone: parse_timezone(zone)?,
            hour,
            minute,
        })
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// Next occurrence strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_today = now.with_timezone(&self.zone).date_naive();
        let today = self.resolve(local_today);
        if today > now {
            return today;
        }
        // calendar day in the zone, not 24h: crosses DST correctly
        let mut date = local_today;
        loop {
            date = match date.succ_opt() {
                Some(d) => d,
                None => return today,
            };
            let candidate = self.resolve(date);
            if candidate > now {
                return candidate;
            }
        }
    }

    /// Non-negative wait from `now` until the next occurrence.
    pub fn duration_until_next(&self, now: DateTime<Utc>) -> Duration {
        (self.next_after(now) - now).to_std().unwrap_or_default()
    }

    /// Map `date hh:mm:00` local to an instant. Ambiguous times (DST fall-back) take the
    /// earlier instant; non-existent ones (DST spring-forward gap) move to the first valid
    /// minute after the gap.
    fn resolve(&self, date: NaiveDate) -> DateTime<Utc> {
        let naive = date
            .and_hms_opt(self.hour, self.minute, 0)
            .unwrap_or_else(|| date.and_time(NaiveTime::default()));
        let mut candidate: NaiveDateTime = naive;
        // gaps are at most a few hours in practice
        for _ in 0..(6 * 60) {
            match self.zone.from_local_datetime(&candidate) {
                LocalResult::Single(dt) => return dt.with_timezone(&Utc),
                LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
                LocalResult::None => candidate += chrono::Duration::minutes(1),
            }
        }
        // unreachable for real zones; treat the wall time as UTC
        Utc.from_utc_datetime(&naive)
    }
}

impl Display for DailySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02} {}", self.hour, self.minute, self.zone.name())
    }
}

/// Loop-owned bookkeeping. Nothing outside the scheduler task reads or writes it.
#[derive(Debug, Clone, Default)]
pub struct ScheduleState {
    pub next_run_at: Option<DateTime<Utc>>,
    pub cycles: u64,
    pub last_error: Option<String>,
}

/// Drives `action` once per day at the configured local time.
#[derive(Debug)]
pub struct DailyScheduler {
    schedule: DailySchedule,
    state: ScheduleState,
}

impl DailyScheduler {
    pub fn new(schedule: DailySchedule) -> Self {
        Self {
            schedule,
            state: ScheduleState::default(),
        }
    }

    pub fn state(&self) -> &ScheduleState {
        &self.state
    }

    /// Next instant to fire at. Measured from the later of `now` and the target that just
    /// ran, so a wall clock lagging the timer cannot schedule the same target twice.
    pub fn next_target(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let reference = match self.state.next_run_at {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        self.schedule.next_after(reference)
    }

    /// Run until `shutdown` fires. A failing action is logged and the loop moves on to
    /// the next scheduled instant. Returns the final state.
    pub async fn run<F, Fut, T, E>(
        mut self,
        shutdown: CancellationToken,
        mut action: F,
    ) -> ScheduleState
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        loop {
            let now = Utc::now();
            let next = self.next_target(now);
            let wait = (next - now).to_std().unwrap_or_default();
            self.state.next_run_at = Some(next);
            gauge!("digest_next_run_ts").set(next.timestamp() as f64);

            tracing::info!(
                target: "scheduler",
                schedule = %self.schedule,
                next_run_at = %next,
                wait_secs = wait.as_secs(),
                "sleeping until next daily run"
            );

            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(target: "scheduler", cycles = self.state.cycles, "scheduler stopped");
                    return self.state;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            self.state.cycles += 1;
            match action().await {
                Ok(_) => {
                    self.state.last_error = None;
                    tracing::info!(target: "scheduler", cycle = self.state.cycles, "daily run finished");
                }
                Err(e) => {
                    counter!("digest_cycle_errors_total").increment(1);
                    tracing::warn!(target: "scheduler", cycle = self.state.cycles, error = %e, "daily run failed");
                    self.state.last_error = Some(e.to_string());
                }
            }

            if shutdown.is_cancelled() {
                return self.state;
            }
        }
    }
}
