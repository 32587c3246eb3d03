//! Focus-driven auto-save.
//!
//! Programs whose reminder fired while they were in the background wait in the
//! pending set. The focus loop sends one save shortcut as soon as one of them
//! becomes the focused process.

use crate::events::ReminderAction;
use crate::matcher;
use crate::models::TargetProgram;
use crate::platform::PlatformAdapter;
use crate::worker::{run_periodic, Worker};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// Result of a save sent because a pending program regained focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub program: TargetProgram,
    pub success: bool,
}

pub struct FocusAutoSaveController {
    platform: Arc<dyn PlatformAdapter>,
    enabled: AtomicBool,
    pending: Mutex<BTreeSet<TargetProgram>>,
    settle_delay: Duration,
}

impl FocusAutoSaveController {
    pub fn new(platform: Arc<dyn PlatformAdapter>, enabled: bool, settle_delay: Duration) -> Self {
        Self {
            platform,
            enabled: AtomicBool::new(enabled),
            pending: Mutex::new(BTreeSet::new()),
            settle_delay,
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, BTreeSet<TargetProgram>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("FocusAutoSaveController: pending mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Turning auto-save off drops every pending entry.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if !enabled {
            self.clear_pending();
        }
        if was != enabled {
            info!("Focus auto-save {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    /// Drop every pending entry.
    pub fn clear_pending(&self) {
        let mut pending = self.lock_pending();
        if !pending.is_empty() {
            debug!("Dropping {} pending saves", pending.len());
        }
        pending.clear();
    }

    /// Queue `program` for a save when it next gains focus. Ignored while
    /// auto-save is disabled. Returns true if the entry was added.
    pub fn register_pending(&self, program: &TargetProgram) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let added = self.lock_pending().insert(program.clone());
        if added {
            debug!("{program} is waiting for focus to save");
        }
        added
    }

    pub fn remove_pending(&self, program: &TargetProgram) -> bool {
        self.lock_pending().remove(program)
    }

    pub fn is_pending(&self, program: &TargetProgram) -> bool {
        self.lock_pending().contains(program)
    }

    pub fn pending(&self) -> Vec<TargetProgram> {
        self.lock_pending().iter().cloned().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    fn focused_name(&self) -> Option<String> {
        match self.platform.focused_process_name() {
            Ok(name) => name,
            Err(e) => {
                warn!("Focus query failed: {e}");
                None
            }
        }
    }

    /// Whether `program` owns the focused window. Query failures count as
    /// not focused.
    pub fn is_focused(&self, program: &TargetProgram) -> bool {
        self.focused_name()
            .is_some_and(|name| matcher::matches(program.as_str(), &name))
    }

    fn send_save(&self, program: &TargetProgram) -> bool {
        match self.platform.inject_save_shortcut() {
            Ok(()) => {
                info!("Sent save shortcut to {program}");
                true
            }
            Err(e) => {
                warn!("Save shortcut for {program} failed: {e}");
                false
            }
        }
    }

    /// One focus check. Saves at most one pending program, which leaves the
    /// set before the shortcut is sent.
    pub fn poll(&self) -> Option<SaveOutcome> {
        if !self.is_enabled() || self.pending_count() == 0 {
            return None;
        }

        let focused = self.focused_name()?;
        let program = {
            let mut pending = self.lock_pending();
            let hit = pending
                .iter()
                .find(|p| matcher::matches(p.as_str(), &focused))
                .cloned()?;
            pending.remove(&hit);
            hit
        };

        let success = self.send_save(&program);
        Some(SaveOutcome { program, success })
    }

    /// Save `program` now, bringing its window forward first if needed.
    ///
    /// If the window cannot be activated the shortcut is still sent to
    /// whatever has focus, and the call reports failure.
    pub fn request_immediate_save(&self, program: &TargetProgram) -> bool {
        if self.is_focused(program) {
            return self.send_save(program);
        }

        let activated = match self.platform.activate_window(program) {
            Ok(()) => {
                thread::sleep(self.settle_delay);
                true
            }
            Err(e) => {
                warn!("Could not bring {program} to the foreground: {e}");
                false
            }
        };

        let sent = self.send_save(program);
        activated && sent
    }

    /// React to a reminder for `program`: save now if it is focused,
    /// otherwise wait for focus.
    pub fn handle_reminder(&self, program: &TargetProgram) -> ReminderAction {
        if !self.is_enabled() {
            return ReminderAction::AutoSaveDisabled;
        }

        if self.is_focused(program) {
            ReminderAction::SavedNow {
                success: self.send_save(program),
            }
        } else {
            self.register_pending(program);
            ReminderAction::QueuedForFocus
        }
    }

    /// Run [`poll`](Self::poll) every `interval` until stopped.
    pub fn start<F>(self: &Arc<Self>, interval: Duration, on_save: F) -> io::Result<Worker>
    where
        F: Fn(&SaveOutcome) + Send + 'static,
    {
        let controller = Arc::clone(self);
        Worker::spawn("focus", move |stop| {
            run_periodic("focus", &stop, interval, || {
                if let Some(outcome) = controller.poll() {
                    on_save(&outcome);
                }
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakePlatform;

    fn controller(enabled: bool) -> (Arc<FakePlatform>, FocusAutoSaveController) {
        let platform = Arc::new(FakePlatform::new());
        let controller = FocusAutoSaveController::new(
            Arc::clone(&platform) as Arc<dyn PlatformAdapter>,
            enabled,
            Duration::ZERO,
        );
        (platform, controller)
    }

    fn code() -> TargetProgram {
        TargetProgram::new("code")
    }

    #[test]
    fn test_register_ignored_when_disabled() {
        let (_, controller) = controller(false);
        assert!(!controller.register_pending(&code()));
        assert_eq!(controller.pending_count(), 0);
    }

    #[test]
    fn test_register_twice_keeps_one_entry() {
        let (_, controller) = controller(true);
        assert!(controller.register_pending(&code()));
        assert!(!controller.register_pending(&code()));
        assert_eq!(controller.pending(), vec![code()]);
    }

    #[test]
    fn test_remove_absent_entry_is_noop() {
        let (_, controller) = controller(true);
        assert!(!controller.remove_pending(&code()));
    }

    #[test]
    fn test_disable_clears_pending() {
        let (_, controller) = controller(true);
        controller.register_pending(&code());
        controller.register_pending(&TargetProgram::new("word"));

        controller.set_enabled(false);
        assert_eq!(controller.pending_count(), 0);
    }

    #[test]
    fn test_clear_pending_keeps_auto_save_enabled() {
        let (platform, controller) = controller(true);
        controller.register_pending(&code());
        controller.register_pending(&TargetProgram::new("word"));

        controller.clear_pending();
        assert_eq!(controller.pending_count(), 0);
        assert!(controller.is_enabled());

        platform.set_focused(Some("code"));
        assert_eq!(controller.poll(), None);
        assert_eq!(platform.injections(), 0);
    }

    #[test]
    fn test_poll_saves_focused_pending_program_once() {
        let (platform, controller) = controller(true);
        controller.register_pending(&code());
        platform.set_focused(Some("Code.exe"));

        let outcome = controller.poll();
        assert_eq!(outcome, Some(SaveOutcome { program: code(), success: true }));
        assert_eq!(platform.injections(), 1);
        assert!(!controller.is_pending(&code()));

        // Nothing left to do on the next tick
        assert_eq!(controller.poll(), None);
        assert_eq!(platform.injections(), 1);
    }

    #[test]
    fn test_poll_saves_one_program_per_tick() {
        let (platform, controller) = controller(true);
        controller.register_pending(&TargetProgram::new("code"));
        controller.register_pending(&TargetProgram::new("vscode"));
        platform.set_focused(Some("vscode"));

        assert!(controller.poll().is_some());
        assert_eq!(platform.injections(), 1);
        assert_eq!(controller.pending_count(), 1);
    }

    #[test]
    fn test_poll_ignores_unrelated_focus() {
        let (platform, controller) = controller(true);
        controller.register_pending(&code());
        platform.set_focused(Some("firefox"));

        assert_eq!(controller.poll(), None);
        assert!(controller.is_pending(&code()));
        assert_eq!(platform.injections(), 0);
    }

    #[test]
    fn test_focus_query_failure_skips_cycle() {
        let (platform, controller) = controller(true);
        controller.register_pending(&code());
        platform.set_focused(Some("code"));
        platform.fail_focus_query(true);

        assert_eq!(controller.poll(), None);
        assert!(controller.is_pending(&code()));
    }

    #[test]
    fn test_failed_injection_still_consumes_entry() {
        let (platform, controller) = controller(true);
        controller.register_pending(&code());
        platform.set_focused(Some("code"));
        platform.fail_injection(true);

        let outcome = controller.poll();
        assert_eq!(outcome, Some(SaveOutcome { program: code(), success: false }));
        assert!(!controller.is_pending(&code()));
    }

    #[test]
    fn test_immediate_save_when_focused() {
        let (platform, controller) = controller(false);
        platform.set_focused(Some("code.exe"));

        assert!(controller.request_immediate_save(&code()));
        assert!(platform.activations().is_empty());
        assert_eq!(platform.injections(), 1);
    }

    #[test]
    fn test_immediate_save_activates_window_first() {
        let (platform, controller) = controller(false);
        platform.set_processes(&[(10, "code.exe")]);
        platform.set_focused(Some("firefox"));

        assert!(controller.request_immediate_save(&code()));
        assert_eq!(platform.activations(), vec![code()]);
        assert_eq!(platform.injected_into(), vec![Some("code.exe".to_string())]);
    }

    #[test]
    fn test_immediate_save_reports_activation_failure() {
        let (platform, controller) = controller(false);
        platform.set_focused(Some("firefox"));

        assert!(!controller.request_immediate_save(&code()));
        // The shortcut still went out to whatever had focus
        assert_eq!(platform.injections(), 1);
    }

    #[test]
    fn test_immediate_save_when_window_refuses_activation() {
        let (platform, controller) = controller(false);
        platform.set_processes(&[(10, "code.exe")]);
        platform.set_focused(Some("firefox"));
        platform.set_can_activate(false);

        assert!(!controller.request_immediate_save(&code()));
        assert!(platform.activations().is_empty());
        assert_eq!(platform.injected_into(), vec![Some("firefox".to_string())]);
    }

    #[test]
    fn test_immediate_save_reports_injection_failure() {
        let (platform, controller) = controller(false);
        platform.set_focused(Some("code"));
        platform.fail_injection(true);

        assert!(!controller.request_immediate_save(&code()));
    }

    #[test]
    fn test_handle_reminder_branches() {
        let (platform, controller) = controller(true);

        platform.set_focused(Some("code"));
        assert_eq!(
            controller.handle_reminder(&code()),
            ReminderAction::SavedNow { success: true }
        );
        assert!(!controller.is_pending(&code()));

        platform.set_focused(Some("firefox"));
        assert_eq!(controller.handle_reminder(&code()), ReminderAction::QueuedForFocus);
        assert!(controller.is_pending(&code()));
    }

    #[test]
    fn test_handle_reminder_when_disabled() {
        let (platform, controller) = controller(false);
        platform.set_focused(Some("code"));

        assert_eq!(controller.handle_reminder(&code()), ReminderAction::AutoSaveDisabled);
        assert_eq!(platform.injections(), 0);
        assert_eq!(controller.pending_count(), 0);
    }

    #[test]
    fn test_focus_loop_reports_saves() {
        let (platform, controller) = controller(true);
        let controller = Arc::new(controller);
        controller.register_pending(&code());
        platform.set_focused(Some("code"));

        let saved = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&saved);
        let worker = controller
            .start(Duration::from_millis(5), move |outcome: &SaveOutcome| {
                sink.lock().unwrap().push(outcome.clone());
            })
            .unwrap();

        thread::sleep(Duration::from_millis(60));
        assert!(worker.shutdown(Duration::from_secs(3)));

        assert_eq!(*saved.lock().unwrap(), vec![SaveOutcome { program: code(), success: true }]);
        assert_eq!(platform.injections(), 1);
    }
}
