//! Engine events and the fan-out bus that delivers them to subscribers.
//!
//! Every subscriber gets its own bounded queue. Producers never block: when a
//! queue is full the oldest queued event is discarded to make room.

use crate::models::{MessageKey, ReminderKind, TargetProgram};
use chrono::{DateTime, Local};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use log::{debug, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

/// What caused a save keystroke to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveTrigger {
    /// A pending program regained focus
    FocusMatch,
    /// The program was focused when its reminder fired
    ReminderFocused,
    /// Requested from the UI
    Manual,
}

/// What the auto-save controller did when a reminder fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReminderAction {
    SavedNow { success: bool },
    QueuedForFocus,
    AutoSaveDisabled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    ProgramStarted {
        program: TargetProgram,
        pid: u32,
    },
    ProgramStopped {
        program: TargetProgram,
    },
    /// A watched program was opened while monitoring
    Welcome {
        program: TargetProgram,
    },
    /// Watched programs that were already running when monitoring began
    StartupWelcome {
        programs: Vec<TargetProgram>,
    },
    ReminderFired {
        program: TargetProgram,
        kind: ReminderKind,
        timestamp: DateTime<Local>,
        message_key: MessageKey,
        #[serde(skip_serializing_if = "Option::is_none")]
        interval_seconds: Option<u64>,
        play_sound: bool,
        offer_manual_save: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        action: Option<ReminderAction>,
    },
    SaveAttempted {
        program: TargetProgram,
        trigger: SaveTrigger,
        success: bool,
    },
}

struct Subscriber {
    tx: Sender<EngineEvent>,
    // Held so the bus can evict the oldest event when the queue is full
    overflow: Receiver<EngineEvent>,
    alive: Weak<()>,
}

/// Receiving end of an event subscription.
pub struct Subscription {
    rx: Receiver<EngineEvent>,
    _token: Arc<()>,
}

impl Subscription {
    pub fn recv(&self) -> Option<EngineEvent> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Everything queued right now.
    pub fn drain(&self) -> Vec<EngineEvent> {
        self.rx.try_iter().collect()
    }
}

pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("EventBus: subscriber mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = bounded(self.capacity);
        let token = Arc::new(());
        self.lock_subscribers().push(Subscriber {
            tx,
            overflow: rx.clone(),
            alive: Arc::downgrade(&token),
        });
        Subscription { rx, _token: token }
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.lock_subscribers();
        subscribers.retain(|s| s.alive.strong_count() > 0);
        subscribers.len()
    }

    pub fn emit(&self, event: &EngineEvent) {
        let mut subscribers = self.lock_subscribers();
        subscribers.retain(|s| s.alive.strong_count() > 0);

        for subscriber in subscribers.iter() {
            match subscriber.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    let _ = subscriber.overflow.try_recv();
                    debug!("Event queue full, dropped oldest event");
                    let _ = subscriber.tx.try_send(event);
                }
                Err(TrySendError::Disconnected(_)) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stopped(name: &str) -> EngineEvent {
        EngineEvent::ProgramStopped {
            program: TargetProgram::new(name),
        }
    }

    #[test]
    fn test_every_subscriber_receives_events() {
        let bus = EventBus::new(8);
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.emit(&stopped("code"));

        assert_eq!(a.try_recv(), Some(stopped("code")));
        assert_eq!(b.try_recv(), Some(stopped("code")));
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let bus = EventBus::new(2);
        let sub = bus.subscribe();

        bus.emit(&stopped("one"));
        bus.emit(&stopped("two"));
        bus.emit(&stopped("three"));

        assert_eq!(sub.drain(), vec![stopped("two"), stopped("three")]);
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let bus = EventBus::new(4);
        let keep = bus.subscribe();
        {
            let _gone = bus.subscribe();
            assert_eq!(bus.subscriber_count(), 2);
        }
        bus.emit(&stopped("code"));
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.drain().len(), 1);
    }

    #[test]
    fn test_event_json_shape() {
        let event = EngineEvent::ProgramStarted {
            program: TargetProgram::new("Code.exe"),
            pid: 42,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "program_started");
        assert_eq!(json["program"], "code");
        assert_eq!(json["pid"], 42);
    }

    #[test]
    fn test_reminder_fired_json_shape() {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let event = EngineEvent::ReminderFired {
            program: TargetProgram::new("Figma.exe"),
            kind: ReminderKind::Save,
            timestamp: at,
            message_key: MessageKey::Design,
            interval_seconds: Some(300),
            play_sound: true,
            offer_manual_save: true,
            action: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "reminder_fired");
        assert_eq!(json["program"], "figma");
        assert_eq!(json["interval_seconds"], 300);
        assert!(json.get("action").is_none());
    }

    #[test]
    fn test_reminder_action_json_shape() {
        let json = serde_json::to_value(ReminderAction::SavedNow { success: true }).unwrap();
        assert_eq!(json["result"], "saved_now");
        assert_eq!(json["success"], true);
    }
}
