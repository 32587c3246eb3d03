// src/constants.rs

use std::time::Duration;

/// Default reminder interval in seconds (5 minutes)
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

/// Shortest reminder interval accepted from configuration
pub const MIN_INTERVAL_SECS: u64 = 10;

/// Longest reminder interval accepted from configuration (1 hour)
pub const MAX_INTERVAL_SECS: u64 = 3600;

/// Process table poll period
pub const SCAN_INTERVAL: Duration = Duration::from_secs(2);

/// Focus poll period for the auto-save controller
pub const FOCUS_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Hourly ticker wake-up period
pub const HOURLY_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Delay between bringing a window forward and sending the save shortcut
pub const ACTIVATION_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// How long shutdown waits for a worker before detaching it
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Upper bound on how long the reminder worker sleeps between deadline checks
pub const SCHEDULER_RESOLUTION: Duration = Duration::from_millis(250);

/// Maximum number of reminder records kept in history
pub const HISTORY_CAPACITY: usize = 100;

/// Default per-subscriber event queue capacity
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 256;

/// Names this long or shorter never match by substring
pub const MIN_SUBSTRING_MATCH_LEN: usize = 3;

/// Program name used for hourly reminders
pub const SYSTEM_PROGRAM: &str = "system";

/// Maximum target program name length
pub const MAX_PROGRAM_NAME_LEN: usize = 255;
