//! The SaveGuard engine.
//!
//! Wires the program monitor, reminder scheduler, focus auto-save controller
//! and hourly ticker together. Components never call each other directly:
//! lifecycle changes and timer fires go through [`Core`], which updates
//! history and publishes [`EngineEvent`]s on the bus.

use crate::autosave::{FocusAutoSaveController, SaveOutcome};
use crate::config::EngineConfig;
use crate::constants::SYSTEM_PROGRAM;
use crate::error::AppError;
use crate::events::{EngineEvent, EventBus, ReminderAction, SaveTrigger, Subscription};
use crate::history::ReminderHistoryLog;
use crate::hourly::HourlyTicker;
use crate::lifecycle::{LifecycleDiff, LifecycleEvent};
use crate::models::{MessageKey, ReminderKind, ReminderRecord, TargetProgram};
use crate::monitor::{LifecycleListener, ProgramMonitor};
use crate::platform::PlatformAdapter;
use crate::scheduler::{ReminderScheduler, TimerState};
use crate::validation::{validate_interval_secs, validate_target_programs};
use crate::worker::Worker;
use chrono::{DateTime, Local};
use log::{info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Counters for the status widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub running: usize,
    pub total_targets: usize,
    pub active_timers: usize,
    pub pending_saves: usize,
    pub auto_save_enabled: bool,
    pub hourly_enabled: bool,
}

/// State shared by every background loop.
struct Core {
    scheduler: Arc<ReminderScheduler>,
    autosave: Arc<FocusAutoSaveController>,
    history: Mutex<ReminderHistoryLog>,
    bus: EventBus,
    sound_enabled: AtomicBool,
    welcome_enabled: AtomicBool,
    // Set while the startup scan runs, which reports one combined welcome
    startup: AtomicBool,
}

impl Core {
    fn lock_history(&self) -> MutexGuard<'_, ReminderHistoryLog> {
        match self.history.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Core: history mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn handle_fire(&self, program: &TargetProgram, at: DateTime<Local>) {
        info!("Save reminder for {program}");
        self.lock_history().append(ReminderRecord::save(program, at));

        let action = self.autosave.handle_reminder(program);
        // A stop that raced this fire must not leave a stray pending entry
        if action == ReminderAction::QueuedForFocus && self.scheduler.state(program) == TimerState::Inactive {
            self.autosave.remove_pending(program);
        }

        let interval = self
            .scheduler
            .timer(program)
            .map_or_else(|| self.scheduler.interval(), |timer| timer.interval);

        self.bus.emit(&EngineEvent::ReminderFired {
            program: program.clone(),
            kind: ReminderKind::Save,
            timestamp: at,
            message_key: MessageKey::for_program(program),
            interval_seconds: Some(interval.as_secs()),
            play_sound: self.sound_enabled.load(Ordering::SeqCst),
            offer_manual_save: true,
            action: Some(action),
        });

        if let ReminderAction::SavedNow { success } = action {
            self.bus.emit(&EngineEvent::SaveAttempted {
                program: program.clone(),
                trigger: SaveTrigger::ReminderFocused,
                success,
            });
        }
    }

    fn handle_hourly(&self, at: DateTime<Local>) {
        info!("Hourly reminder");
        self.lock_history().append(ReminderRecord::hourly(at));

        self.bus.emit(&EngineEvent::ReminderFired {
            program: TargetProgram::new(SYSTEM_PROGRAM),
            kind: ReminderKind::Hourly,
            timestamp: at,
            message_key: MessageKey::Hourly,
            interval_seconds: None,
            play_sound: self.sound_enabled.load(Ordering::SeqCst),
            offer_manual_save: false,
            action: None,
        });
    }

    fn handle_focus_save(&self, outcome: &SaveOutcome) {
        self.bus.emit(&EngineEvent::SaveAttempted {
            program: outcome.program.clone(),
            trigger: SaveTrigger::FocusMatch,
            success: outcome.success,
        });
    }
}

impl LifecycleListener for Core {
    fn on_lifecycle(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Started { program, pid } => {
                self.scheduler.arm(program, Instant::now());
                self.bus.emit(&EngineEvent::ProgramStarted {
                    program: program.clone(),
                    pid: *pid,
                });
                if self.welcome_enabled.load(Ordering::SeqCst) && !self.startup.load(Ordering::SeqCst) {
                    self.bus.emit(&EngineEvent::Welcome {
                        program: program.clone(),
                    });
                }
            }
            LifecycleEvent::Stopped { program } => {
                self.scheduler.cancel(program);
                self.autosave.remove_pending(program);
                self.bus.emit(&EngineEvent::ProgramStopped {
                    program: program.clone(),
                });
            }
        }
    }
}

#[derive(Default)]
struct Workers {
    monitor: Option<Worker>,
    scheduler: Option<Worker>,
    focus: Option<Worker>,
    hourly: Option<Worker>,
}

impl Workers {
    fn take_all(&mut self) -> Vec<Worker> {
        [
            self.monitor.take(),
            self.scheduler.take(),
            self.focus.take(),
            self.hourly.take(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct LoopPeriods {
    scan: Duration,
    focus_poll: Duration,
    hourly_check: Duration,
    shutdown_timeout: Duration,
}

pub struct SaveGuardEngine {
    core: Arc<Core>,
    monitor: Arc<ProgramMonitor>,
    workers: Mutex<Workers>,
    periods: LoopPeriods,
    hourly_enabled: AtomicBool,
    running: AtomicBool,
}

impl SaveGuardEngine {
    pub fn new(config: &EngineConfig, platform: Arc<dyn PlatformAdapter>) -> Result<Self, AppError> {
        config.validate()?;
        let targets = config.targets()?;

        let core = Arc::new(Core {
            scheduler: Arc::new(ReminderScheduler::new(config.interval())),
            autosave: Arc::new(FocusAutoSaveController::new(
                Arc::clone(&platform),
                config.focus_auto_save_enabled,
                config.activation_settle_delay(),
            )),
            history: Mutex::new(ReminderHistoryLog::new()),
            bus: EventBus::new(config.event_queue_capacity),
            sound_enabled: AtomicBool::new(config.sound_enabled),
            welcome_enabled: AtomicBool::new(config.welcome_message_enabled),
            startup: AtomicBool::new(false),
        });

        let listener: Arc<dyn LifecycleListener> = Arc::<Core>::clone(&core);
        let monitor = Arc::new(ProgramMonitor::new(platform, targets, listener));

        Ok(Self {
            core,
            monitor,
            workers: Mutex::new(Workers::default()),
            periods: LoopPeriods {
                scan: config.scan_interval(),
                focus_poll: config.focus_poll_interval(),
                hourly_check: config.hourly_check_interval(),
                shutdown_timeout: config.shutdown_timeout(),
            },
            hourly_enabled: AtomicBool::new(config.hourly_remind_enabled),
            running: AtomicBool::new(false),
        })
    }

    fn lock_workers(&self) -> MutexGuard<'_, Workers> {
        match self.workers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("SaveGuardEngine: workers mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Scan once for programs that are already running, then start the
    /// background loops. Calling it on a running engine does nothing.
    pub fn start(&self) -> Result<(), AppError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Err(e) = self.spawn_workers() {
            self.running.store(false, Ordering::SeqCst);
            for worker in self.lock_workers().take_all() {
                worker.request_stop();
            }
            return Err(e);
        }

        info!(
            "Monitoring {} programs, reminders every {}s",
            self.monitor.targets().len(),
            self.core.scheduler.interval().as_secs()
        );
        Ok(())
    }

    fn startup_scan(&self) {
        self.core.startup.store(true, Ordering::SeqCst);
        let changes = self.monitor.poll();
        self.core.startup.store(false, Ordering::SeqCst);

        if self.core.welcome_enabled.load(Ordering::SeqCst) && !changes.started.is_empty() {
            let programs = changes.started.into_iter().map(|(program, _)| program).collect();
            self.core.bus.emit(&EngineEvent::StartupWelcome { programs });
        }
    }

    fn spawn_workers(&self) -> Result<(), AppError> {
        self.startup_scan();

        let mut workers = self.lock_workers();
        workers.monitor = Some(self.monitor.start(self.periods.scan)?);

        let core = Arc::clone(&self.core);
        workers.scheduler = Some(
            self.core
                .scheduler
                .start(move |program: &TargetProgram| core.handle_fire(program, Local::now()))?,
        );

        let core = Arc::clone(&self.core);
        workers.focus = Some(
            self.core
                .autosave
                .start(self.periods.focus_poll, move |outcome: &SaveOutcome| {
                    core.handle_focus_save(outcome);
                })?,
        );

        if self.hourly_enabled.load(Ordering::SeqCst) {
            workers.hourly = Some(self.spawn_hourly()?);
        }
        Ok(())
    }

    fn spawn_hourly(&self) -> Result<Worker, AppError> {
        let core = Arc::clone(&self.core);
        Ok(HourlyTicker::start(self.periods.hourly_check, move |at| core.handle_hourly(at))?)
    }

    /// Stop every loop, cancel all timers and drop pending saves. Waits at most the configured
    /// shutdown timeout in total; returns false if some loop had to be
    /// detached.
    pub fn shutdown(&self) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            return true;
        }

        let workers = self.lock_workers().take_all();
        for worker in &workers {
            worker.request_stop();
        }

        let deadline = Instant::now() + self.periods.shutdown_timeout;
        let mut clean = true;
        for worker in workers {
            let name = worker.name().to_string();
            if !worker.shutdown(deadline.saturating_duration_since(Instant::now())) {
                warn!("Worker {name} did not stop in time");
                clean = false;
            }
        }

        self.core.scheduler.cancel_all();
        self.core.autosave.clear_pending();
        self.monitor.reset();
        info!("Engine stopped");
        clean
    }

    pub fn subscribe(&self) -> Subscription {
        self.core.bus.subscribe()
    }

    /// Newest reminder records first.
    pub fn recent(&self, n: usize) -> Vec<ReminderRecord> {
        self.core.lock_history().recent(n)
    }

    pub fn clear_history(&self) {
        self.core.lock_history().clear();
    }

    /// Save `program` right away on behalf of the user. Returns false if the
    /// window could not be brought forward or the shortcut failed.
    pub fn request_immediate_save(&self, program: &str) -> bool {
        let program = TargetProgram::new(program);
        if program.is_empty() {
            return false;
        }

        let success = self.core.autosave.request_immediate_save(&program);
        if success {
            self.core.autosave.remove_pending(&program);
        }
        self.core.bus.emit(&EngineEvent::SaveAttempted {
            program,
            trigger: SaveTrigger::Manual,
            success,
        });
        success
    }

    pub fn set_auto_save_enabled(&self, enabled: bool) {
        self.core.autosave.set_enabled(enabled);
    }

    pub fn set_sound_enabled(&self, enabled: bool) {
        self.core.sound_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_welcome_enabled(&self, enabled: bool) {
        self.core.welcome_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Turn the hourly reminder on or off, starting or stopping its loop if
    /// the engine is running.
    pub fn set_hourly_enabled(&self, enabled: bool) -> Result<(), AppError> {
        self.hourly_enabled.store(enabled, Ordering::SeqCst);

        // shutdown() clears `running` before it takes the workers under this lock
        let mut workers = self.lock_workers();
        if !self.is_running() {
            return Ok(());
        }
        match (enabled, workers.hourly.take()) {
            (true, None) => workers.hourly = Some(self.spawn_hourly()?),
            (true, Some(worker)) => workers.hourly = Some(worker),
            (false, Some(worker)) => {
                drop(workers);
                worker.shutdown(self.periods.shutdown_timeout);
            }
            (false, None) => {}
        }
        Ok(())
    }

    /// Applies to timers armed after the call.
    pub fn set_interval_seconds(&self, interval_secs: u64) -> Result<(), AppError> {
        let interval_secs = validate_interval_secs(interval_secs)?;
        self.core.scheduler.set_interval(Duration::from_secs(interval_secs));
        info!("Reminder interval set to {interval_secs}s");
        Ok(())
    }

    /// Replace the watched programs. While running, the monitor re-scans
    /// immediately and programs dropped from the list are reported stopped.
    pub fn set_target_programs<S: AsRef<str>>(&self, names: &[S]) -> Result<(), AppError> {
        let targets = validate_target_programs(names)?;
        info!("Now monitoring {} programs", targets.len());
        self.monitor.set_targets(targets);
        if self.is_running() {
            self.monitor.poll();
        }
        Ok(())
    }

    pub fn target_programs(&self) -> Vec<TargetProgram> {
        self.monitor.targets()
    }

    pub fn running_programs(&self) -> Vec<(TargetProgram, u32)> {
        self.monitor
            .snapshot()
            .iter()
            .map(|(program, pid)| (program.clone(), pid))
            .collect()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            running: self.monitor.snapshot().len(),
            total_targets: self.monitor.targets().len(),
            active_timers: self.core.scheduler.active_count(),
            pending_saves: self.core.autosave.pending_count(),
            auto_save_enabled: self.core.autosave.is_enabled(),
            hourly_enabled: self.hourly_enabled.load(Ordering::SeqCst),
        }
    }

    /// Run one monitor poll on the calling thread.
    pub fn poll_now(&self) -> LifecycleDiff {
        self.monitor.poll()
    }

    /// Fire every reminder due at `now` on the calling thread. Returns how
    /// many fired.
    pub fn fire_due(&self, now: Instant) -> usize {
        let due = self.core.scheduler.take_due(now);
        for program in &due {
            self.core.handle_fire(program, Local::now());
        }
        due.len()
    }

    /// Run one focus check on the calling thread.
    pub fn poll_focus_now(&self) -> Option<SaveOutcome> {
        let outcome = self.core.autosave.poll()?;
        self.core.handle_focus_save(&outcome);
        Some(outcome)
    }
}

impl Drop for SaveGuardEngine {
    fn drop(&mut self) {
        if self.is_running() {
            self.shutdown();
        }
    }
}
