use crate::lifecycle::{LifecycleDiff, LifecycleEvent, LifecycleTracker};
use crate::models::{ProcessSnapshot, TargetProgram};
use crate::platform::PlatformAdapter;
use crate::scanner::ProcessScanner;
use crate::worker::{run_periodic, Worker};
use log::{info, warn};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

/// Receives lifecycle events from the monitor.
pub trait LifecycleListener: Send + Sync {
    fn on_lifecycle(&self, event: &LifecycleEvent);
}

impl<F> LifecycleListener for F
where
    F: Fn(&LifecycleEvent) + Send + Sync,
{
    fn on_lifecycle(&self, event: &LifecycleEvent) {
        self(event);
    }
}

/// Polls the process table and reports target programs starting and stopping.
pub struct ProgramMonitor {
    scanner: ProcessScanner,
    tracker: Mutex<LifecycleTracker>,
    targets: RwLock<Vec<TargetProgram>>,
    listener: Arc<dyn LifecycleListener>,
}

impl ProgramMonitor {
    pub fn new(
        platform: Arc<dyn PlatformAdapter>,
        targets: Vec<TargetProgram>,
        listener: Arc<dyn LifecycleListener>,
    ) -> Self {
        Self {
            scanner: ProcessScanner::new(platform),
            tracker: Mutex::new(LifecycleTracker::new()),
            targets: RwLock::new(targets),
            listener,
        }
    }

    fn lock_tracker(&self) -> MutexGuard<'_, LifecycleTracker> {
        match self.tracker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("ProgramMonitor: tracker mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn targets(&self) -> Vec<TargetProgram> {
        self.targets.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Replace the watched set. Takes effect on the next poll; programs no
    /// longer targeted are then reported as stopped.
    pub fn set_targets(&self, targets: Vec<TargetProgram>) {
        *self.targets.write().unwrap_or_else(|p| p.into_inner()) = targets;
    }

    /// Scan once, diff against the last snapshot, and notify the listener.
    ///
    /// The tracker stays locked until every event has been delivered, so two
    /// polls never interleave.
    pub fn poll(&self) -> LifecycleDiff {
        let targets = self.targets();
        let mut tracker = self.lock_tracker();

        let current = self.scanner.scan(&targets, tracker.snapshot());
        let changes = tracker.advance(current);

        for event in changes.events() {
            match &event {
                LifecycleEvent::Started { program, pid } => info!("Program started: {program} (pid {pid})"),
                LifecycleEvent::Stopped { program } => info!("Program stopped: {program}"),
            }
            self.listener.on_lifecycle(&event);
        }

        changes
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        self.lock_tracker().snapshot().clone()
    }

    /// Forget the last snapshot so the next poll reports every running
    /// target as started again.
    pub fn reset(&self) {
        *self.lock_tracker() = LifecycleTracker::new();
    }

    /// Poll every `interval` on a background thread.
    pub fn start(self: &Arc<Self>, interval: Duration) -> io::Result<Worker> {
        let monitor = Arc::clone(self);
        Worker::spawn("monitor", move |stop| {
            run_periodic("monitor", &stop, interval, || {
                monitor.poll();
            });
        })
    }
}
