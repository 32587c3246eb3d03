use crate::constants::SYSTEM_PROGRAM;
use crate::models::TargetProgram;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// Periodic reminder from a program's timer
    Save,
    /// Top-of-the-hour reminder attributed to the system
    Hourly,
}

impl ReminderKind {
    pub fn label(self) -> &'static str {
        match self {
            ReminderKind::Save => "save reminder",
            ReminderKind::Hourly => "hourly reminder",
        }
    }
}

/// Localization key the UI resolves into reminder text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKey {
    Default,
    Code,
    Document,
    Design,
    Welcome,
    Hourly,
}

const CODE_EDITORS: &[&str] = &["code", "notepad++", "sublime", "atom"];
const DESIGN_TOOLS: &[&str] = &["photoshop", "illustrator", "figma", "sketch"];
const DOCUMENT_APPS: &[&str] = &["word", "excel", "powerpoint"];

impl MessageKey {
    /// Pick the reminder message family for a program.
    pub fn for_program(program: &TargetProgram) -> Self {
        let name = program.as_str();
        let contains_any = |needles: &[&str]| needles.iter().any(|n| name.contains(n));

        if contains_any(CODE_EDITORS) {
            MessageKey::Code
        } else if contains_any(DESIGN_TOOLS) {
            MessageKey::Design
        } else if contains_any(DOCUMENT_APPS) {
            MessageKey::Document
        } else {
            MessageKey::Default
        }
    }
}

/// One fired reminder, as kept in history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReminderRecord {
    pub program: String,
    pub kind: ReminderKind,
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl ReminderRecord {
    pub fn new(program: &str, kind: ReminderKind, timestamp: DateTime<Local>) -> Self {
        Self {
            program: program.to_string(),
            kind,
            timestamp,
            message: format!("{program} - {}", kind.label()),
        }
    }

    pub fn save(program: &TargetProgram, timestamp: DateTime<Local>) -> Self {
        Self::new(program.as_str(), ReminderKind::Save, timestamp)
    }

    pub fn hourly(timestamp: DateTime<Local>) -> Self {
        Self::new(SYSTEM_PROGRAM, ReminderKind::Hourly, timestamp)
    }
}
