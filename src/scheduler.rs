//! Daily trigger for daemon mode

use chrono::{DateTime, Days, NaiveTime, Utc};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::validation::parse_trigger_time;
use crate::error::AppError;
use crate::pipeline::{Pipeline, Step};
use crate::warehouse::Warehouse;

/// Fires once a day at a fixed UTC wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTrigger {
    time: NaiveTime,
}

impl DailyTrigger {
    pub fn new(time: NaiveTime) -> Self {
        DailyTrigger { time }
    }

    /// Parses an `HH:MM` trigger time.
    pub fn parse(value: &str) -> Result<Self, AppError> {
        parse_trigger_time(value).map(Self::new)
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// First trigger instant strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.time).and_utc();
        if today > now {
            today
        } else {
            // Adding a day to a valid date only fails at the end of chrono's range
            now.date_naive()
                .checked_add_days(Days::new(1))
                .map(|d| d.and_time(self.time).and_utc())
                .unwrap_or(today)
        }
    }
}

/// Runs the pipeline every day at the trigger time until Ctrl-C.
///
/// The run date is the UTC date of the trigger. A failed run is logged and
/// the daemon waits for the next trigger; an in-flight run is abandoned on
/// shutdown, which releases its lock and rolls back any open load.
pub async fn run_daily<W: Warehouse>(pipeline: &Pipeline<W>, trigger: DailyTrigger) -> Result<(), AppError> {
    info!("Daemon started; daily trigger at {} UTC", trigger.time().format("%H:%M"));

    loop {
        let now = Utc::now();
        let fire_at = trigger.next_after(now);
        let wait = (fire_at - now).to_std().unwrap_or(Duration::ZERO);
        info!("Next run at {} (in {}s)", fire_at.to_rfc3339(), wait.as_secs());

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested while idle");
                return Ok(());
            }
        }

        let run_date = fire_at.date_naive();
        tokio::select! {
            result = pipeline.run(run_date, Step::Extract) => match result {
                Ok(summary) => info!(
                    "Daily run for {} loaded {} rows",
                    run_date,
                    summary.rows_loaded()
                ),
                Err(e) => error!("Daily run for {} failed [{}]: {}", run_date, e.kind(), e),
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("Shutdown requested; abandoning run for {run_date}");
                return Ok(());
            }
        }
    }
}
