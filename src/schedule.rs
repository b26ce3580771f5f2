//! Daily timer: wake once a minute and run once the local clock has reached
//! the target `HH:MM`, at most once per date. A tick that misses the exact
//! minute (suspend, clock step) still runs that day.
//!
//! Runs are awaited inline, so a run that outlasts a minute simply delays the
//! next check; there is no overlap protection beyond that.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::future::Future;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

const CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Parse `HH:MM` (24h). Used as a clap value parser.
pub fn parse_run_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|e| format!("expected HH:MM, got '{s}': {e}"))
}

/// At or past `at` today, and not yet run on this date.
pub fn is_due(now: NaiveDateTime, at: NaiveTime, last_run: Option<NaiveDate>) -> bool {
    now.time() >= at && last_run != Some(now.date())
}

/// Starting after today's target minute waits for tomorrow.
pub fn initial_last_run(now: NaiveDateTime, at: NaiveTime) -> Option<NaiveDate> {
    let started_after = (now.hour(), now.minute()) > (at.hour(), at.minute());
    started_after.then_some(now.date())
}

/// Loop forever, calling `task` once per day at `at` local time.
pub async fn run_daily<F, Fut>(at: NaiveTime, mut task: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    info!(at = %at.format("%H:%M"), "Scheduler started");
    let mut interval = time::interval(CHECK_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_run = initial_last_run(Local::now().naive_local(), at);

    loop {
        interval.tick().await;
        let now = Local::now().naive_local();
        if !is_due(now, at, last_run) {
            debug!(now = %now.format("%H:%M"), "Not due yet");
            continue;
        }
        info!(date = %now.date(), "Scheduled run starting");
        last_run = Some(now.date());
        task().await;
        info!("Scheduled run finished; waiting for tomorrow");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn now(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, day)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn parses_valid_times() {
        assert_eq!(parse_run_time("08:00").unwrap(), at(8, 0));
        assert_eq!(parse_run_time("23:59").unwrap(), at(23, 59));
    }

    #[test]
    fn rejects_invalid_times() {
        assert!(parse_run_time("24:00").is_err());
        assert!(parse_run_time("8am").is_err());
        assert!(parse_run_time("").is_err());
    }

    #[test]
    fn due_from_target_minute_on() {
        assert!(is_due(now(16, 8, 0, 42), at(8, 0), None));
        assert!(!is_due(now(16, 7, 59, 59), at(8, 0), None));
    }

    #[test]
    fn skipped_minute_still_runs_that_day() {
        let yesterday = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert!(is_due(now(16, 8, 3, 0), at(8, 0), Some(yesterday)));
        assert!(is_due(now(16, 23, 59, 0), at(8, 0), Some(yesterday)));
    }

    #[test]
    fn late_start_waits_for_tomorrow() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 16).unwrap();
        assert_eq!(initial_last_run(now(16, 10, 0, 0), at(8, 0)), Some(today));
        assert_eq!(initial_last_run(now(16, 8, 0, 30), at(8, 0)), None);
        assert_eq!(initial_last_run(now(16, 7, 0, 0), at(8, 0)), None);
        let last = initial_last_run(now(16, 10, 0, 0), at(8, 0));
        assert!(!is_due(now(16, 10, 1, 0), at(8, 0), last));
        assert!(is_due(now(17, 8, 0, 0), at(8, 0), last));
    }

    #[test]
    fn runs_once_per_date() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 16).unwrap();
        assert!(!is_due(now(16, 8, 0, 30), at(8, 0), Some(today)));
        assert!(is_due(now(17, 8, 0, 5), at(8, 0), Some(today)));
    }
}
