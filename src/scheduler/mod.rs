//! Per-program repeating reminder timers.
//!
//! A program has an armed timer exactly while it is running. Timers are kept
//! in one table and checked by a single worker thread, which wakes at least
//! every [`SCHEDULER_RESOLUTION`] or when the earliest deadline arrives.

use crate::constants::SCHEDULER_RESOLUTION;
use crate::models::TargetProgram;
use crate::worker::{panic_message, StopSignal, Worker};
use log::{debug, error, warn};
use std::collections::HashMap;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Inactive,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderTimer {
    pub interval: Duration,
    pub next_fire: Instant,
}

pub struct ReminderScheduler {
    timers: Mutex<HashMap<TargetProgram, ReminderTimer>>,
    interval: Mutex<Duration>,
}

impl ReminderScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            timers: Mutex::new(HashMap::new()),
            interval: Mutex::new(interval),
        }
    }

    fn lock_timers(&self) -> MutexGuard<'_, HashMap<TargetProgram, ReminderTimer>> {
        match self.timers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("ReminderScheduler: timer mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn interval(&self) -> Duration {
        *self.interval.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Interval for timers armed from now on. Running timers keep theirs.
    pub fn set_interval(&self, interval: Duration) {
        *self.interval.lock().unwrap_or_else(|p| p.into_inner()) = interval;
    }

    /// Arm a timer for `program`. Returns false if one is already armed.
    pub fn arm(&self, program: &TargetProgram, now: Instant) -> bool {
        let interval = self.interval();
        let mut timers = self.lock_timers();
        if timers.contains_key(program) {
            return false;
        }

        timers.insert(
            program.clone(),
            ReminderTimer {
                interval,
                next_fire: now + interval,
            },
        );
        debug!("Armed reminder for {program} every {}s", interval.as_secs());
        true
    }

    /// Cancel the timer for `program`. Returns false if none was armed.
    pub fn cancel(&self, program: &TargetProgram) -> bool {
        let removed = self.lock_timers().remove(program).is_some();
        if removed {
            debug!("Cancelled reminder for {program}");
        }
        removed
    }

    pub fn cancel_all(&self) {
        self.lock_timers().clear();
    }

    pub fn state(&self, program: &TargetProgram) -> TimerState {
        if self.lock_timers().contains_key(program) {
            TimerState::Active
        } else {
            TimerState::Inactive
        }
    }

    pub fn timer(&self, program: &TargetProgram) -> Option<ReminderTimer> {
        self.lock_timers().get(program).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.lock_timers().len()
    }

    pub fn active_programs(&self) -> Vec<TargetProgram> {
        let mut programs: Vec<_> = self.lock_timers().keys().cloned().collect();
        programs.sort();
        programs
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.lock_timers().values().map(|t| t.next_fire).min()
    }

    /// Collect every timer due at `now` and re-arm it one interval from `now`.
    pub fn take_due(&self, now: Instant) -> Vec<TargetProgram> {
        let mut timers = self.lock_timers();
        let mut due: Vec<TargetProgram> = timers
            .iter_mut()
            .filter(|(_, timer)| timer.next_fire <= now)
            .map(|(program, timer)| {
                timer.next_fire = now + timer.interval;
                program.clone()
            })
            .collect();
        due.sort();
        due
    }

    /// Fire due timers on a background thread until stopped.
    ///
    /// `on_fire` runs outside the timer lock, so a timer cancelled while its
    /// handler runs only stops future fires.
    pub fn start<F>(self: &Arc<Self>, on_fire: F) -> io::Result<Worker>
    where
        F: Fn(&TargetProgram) + Send + 'static,
    {
        let scheduler = Arc::clone(self);
        Worker::spawn("scheduler", move |stop| scheduler.run(&stop, &on_fire))
    }

    fn run<F>(&self, stop: &StopSignal, on_fire: &F)
    where
        F: Fn(&TargetProgram),
    {
        debug!("scheduler: loop started");
        while !stop.is_stopped() {
            let now = Instant::now();
            for program in self.take_due(now) {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| on_fire(&program))) {
                    error!(
                        "scheduler: reminder handler for {program} panicked: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }

            let wait = self
                .next_deadline()
                .map_or(SCHEDULER_RESOLUTION, |deadline| {
                    deadline.saturating_duration_since(Instant::now())
                })
                .min(SCHEDULER_RESOLUTION);

            if stop.wait_timeout(wait) {
                break;
            }
        }
        debug!("scheduler: loop stopped");
    }
}
