use crate::constants::*;
use crate::error::AppError;
use crate::models::TargetProgram;
use crate::validation::{
    validate_interval_secs, validate_period, validate_queue_capacity, validate_target_programs,
};
use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "saveguard.json";

/// Engine settings as stored in `saveguard.json`. Missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub target_programs: Vec<String>,
    pub interval_seconds: u64,
    pub sound_enabled: bool,
    pub focus_auto_save_enabled: bool,
    pub hourly_remind_enabled: bool,
    pub welcome_message_enabled: bool,
    pub scan_interval_ms: u64,
    pub focus_poll_interval_ms: u64,
    pub hourly_check_interval_secs: u64,
    pub activation_settle_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub event_queue_capacity: usize,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_programs: Vec::new(),
            interval_seconds: DEFAULT_INTERVAL_SECS,
            sound_enabled: true,
            focus_auto_save_enabled: false,
            hourly_remind_enabled: false,
            welcome_message_enabled: true,
            scan_interval_ms: duration_ms(SCAN_INTERVAL),
            focus_poll_interval_ms: duration_ms(FOCUS_POLL_INTERVAL),
            hourly_check_interval_secs: HOURLY_CHECK_INTERVAL.as_secs(),
            activation_settle_ms: duration_ms(ACTIVATION_SETTLE_DELAY),
            shutdown_timeout_ms: duration_ms(SHUTDOWN_TIMEOUT),
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            log_level: "info".to_string(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_target_programs(&self.target_programs)?;
        validate_interval_secs(self.interval_seconds)?;
        validate_period("scan_interval_ms", self.scan_interval_ms)?;
        validate_period("focus_poll_interval_ms", self.focus_poll_interval_ms)?;
        validate_period("hourly_check_interval_secs", self.hourly_check_interval_secs)?;
        validate_queue_capacity(self.event_queue_capacity)?;
        Ok(())
    }

    /// Normalized, de-duplicated target list.
    pub fn targets(&self) -> Result<Vec<TargetProgram>, AppError> {
        validate_target_programs(&self.target_programs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn focus_poll_interval(&self) -> Duration {
        Duration::from_millis(self.focus_poll_interval_ms)
    }

    pub fn hourly_check_interval(&self) -> Duration {
        Duration::from_secs(self.hourly_check_interval_secs)
    }

    pub fn activation_settle_delay(&self) -> Duration {
        Duration::from_millis(self.activation_settle_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, else the default location. A missing file at the
    /// default location yields the defaults; a missing explicit file is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, AppError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let path = default_config_path()?;
        if path.exists() {
            Self::load(&path)
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

pub fn default_config_path() -> Result<PathBuf, AppError> {
    let proj_dirs = ProjectDirs::from("com", "saveguard", "SaveGuard").ok_or(AppError::NoProjectDirs)?;
    Ok(proj_dirs.config_dir().join(CONFIG_FILE_NAME))
}
