use crate::worker::{run_periodic, Worker};
use chrono::{DateTime, Local, Timelike};
use log::debug;
use std::io;
use std::time::Duration;

/// Fires once per change of the wall-clock hour, never during hour 0.
#[derive(Debug, Default)]
pub struct HourlyTicker {
    // None until the first fire, so any real hour counts as new
    last_fired_hour: Option<u32>,
}

impl HourlyTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_fired_hour(&self) -> Option<u32> {
        self.last_fired_hour
    }

    /// Returns true when a reminder should fire for `hour`.
    pub fn check(&mut self, hour: u32) -> bool {
        if hour == 0 || self.last_fired_hour == Some(hour) {
            return false;
        }
        self.last_fired_hour = Some(hour);
        true
    }

    /// Check the local clock every `interval` and call `on_fire` with the
    /// time of each fire.
    pub fn start<F>(interval: Duration, on_fire: F) -> io::Result<Worker>
    where
        F: Fn(DateTime<Local>) + Send + 'static,
    {
        Worker::spawn("hourly", move |stop| {
            let mut ticker = HourlyTicker::new();
            run_periodic("hourly", &stop, interval, || {
                let now = Local::now();
                if ticker.check(now.hour()) {
                    debug!("Hourly reminder for {:02}:00", now.hour());
                    on_fire(now);
                }
            });
        })
    }
}
