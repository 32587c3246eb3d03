use super::{PlatformAdapter, ProcessTable};
use crate::error::PlatformError;
use crate::matcher;
use crate::models::{ProcessEntry, TargetProgram};
use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation, CGKeyCode};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use log::debug;
use std::process::Command;

/// kVK_ANSI_S
const KEY_S: CGKeyCode = 1;

pub struct MacOSPlatform {
    processes: ProcessTable,
}

impl Default for MacOSPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MacOSPlatform {
    pub fn new() -> Self {
        Self {
            processes: ProcessTable::new(),
        }
    }

    fn run_osascript(script: &str) -> Result<String, PlatformError> {
        let output = Command::new("osascript")
            .args(["-e", script])
            .output()
            .map_err(|e| PlatformError::Unavailable(format!("osascript: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlatformError::Query(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl PlatformAdapter for MacOSPlatform {
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, PlatformError> {
        self.processes.list()
    }

    fn focused_process_name(&self) -> Result<Option<String>, PlatformError> {
        let out = Self::run_osascript(
            "tell application \"System Events\" to get unix id of first application process whose frontmost is true",
        )?;

        let pid: u32 = out
            .parse()
            .map_err(|_| PlatformError::Query(format!("unexpected frontmost pid '{out}'")))?;

        Ok(self.processes.name_of(pid))
    }

    fn activate_window(&self, program: &TargetProgram) -> Result<(), PlatformError> {
        let pid = self
            .processes
            .list()?
            .into_iter()
            .find(|entry| matcher::matches(program.as_str(), &entry.name))
            .map(|entry| entry.pid)
            .ok_or_else(|| PlatformError::WindowNotFound {
                program: program.to_string(),
            })?;

        Self::run_osascript(&format!(
            "tell application \"System Events\" to set frontmost of first application process whose unix id is {pid} to true"
        ))?;

        debug!("Brought {program} (pid {pid}) to the front");
        Ok(())
    }

    fn inject_save_shortcut(&self) -> Result<(), PlatformError> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|()| PlatformError::Injection("could not create event source".into()))?;

        for key_down in [true, false] {
            let event = CGEvent::new_keyboard_event(source.clone(), KEY_S, key_down)
                .map_err(|()| PlatformError::Injection("could not create key event".into()))?;
            event.set_flags(CGEventFlags::CGEventFlagCommand);
            event.post(CGEventTapLocation::HID);
        }

        Ok(())
    }
}
