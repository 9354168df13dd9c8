use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::app::App;

/// Upper bound on a single sleep, so wall-clock jumps are noticed.
const MAX_SLEEP: Duration = Duration::from_secs(15 * 60);

/// Fires once a day at a local wall-clock time in a fixed zone.
#[derive(Debug, Clone, Copy)]
pub struct DailySchedule {
    pub tz: Tz,
    pub at: NaiveTime,
}

impl DailySchedule {
    pub fn new(tz: Tz, at: NaiveTime) -> Self {
        Self { tz, at }
    }

    /// First firing instant strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut date = now.with_timezone(&self.tz).date_naive();
        loop {
            if let Some(fire) = self.fire_on(date) {
                if fire > now {
                    return fire;
                }
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => return now + TimeDelta::days(1),
            }
        }
    }

    /// The instant this schedule fires on a local calendar day. A time that
    /// falls in a DST gap moves to the first minute that exists; a repeated
    /// time uses its earlier occurrence.
    fn fire_on(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let local = date.and_time(self.at);
        match self.tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
            LocalResult::None => (1..=180).find_map(|minutes| {
                self.tz
                    .from_local_datetime(&(local + TimeDelta::minutes(minutes)))
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
            }),
        }
    }
}

/// Idle until the next fire time, run the daily job to completion, repeat.
/// Job errors are logged; the trigger itself never stops.
pub async fn run_daily(schedule: DailySchedule, app: Arc<App>) {
    loop {
        let next = schedule.next_after(Utc::now());
        tracing::info!("Next daily send at {}", next.with_timezone(&schedule.tz));

        loop {
            let now = Utc::now();
            if now >= next {
                break;
            }
            let wait = (next - now).to_std().unwrap_or_default().min(MAX_SLEEP);
            tokio::time::sleep(wait).await;
        }

        tracing::info!("Daily job firing");
        match app.send_daily_albums().await {
            Ok(outcome) => tracing::info!("Daily job finished: {:?}", outcome),
            Err(e) => tracing::error!("Daily job failed: {}", e),
        }
    }
}
