//! Shared test utilities for SaveGuard.
//!
//! [`FakePlatform`] stands in for the OS: tests script the process table and
//! the focused program, then inspect how many save keystrokes were sent.

#![cfg(test)]

use crate::error::PlatformError;
use crate::matcher;
use crate::models::{ProcessEntry, TargetProgram};
use crate::platform::PlatformAdapter;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct FakeState {
    processes: Vec<ProcessEntry>,
    focused: Option<String>,
    fail_listing: bool,
    fail_focus: bool,
    fail_injection: bool,
    can_activate: bool,
    activations: Vec<TargetProgram>,
    injections: usize,
    // Names that were focused when each keystroke was sent
    injected_into: Vec<Option<String>>,
}

#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<FakeState>,
}

impl FakePlatform {
    pub fn new() -> Self {
        let platform = Self::default();
        platform.state().can_activate = true;
        platform
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_processes(&self, processes: &[(u32, &str)]) {
        self.state().processes = processes
            .iter()
            .map(|(pid, name)| ProcessEntry::new(*pid, name))
            .collect();
    }

    pub fn set_focused(&self, name: Option<&str>) {
        self.state().focused = name.map(str::to_string);
    }

    pub fn fail_process_listing(&self, fail: bool) {
        self.state().fail_listing = fail;
    }

    pub fn fail_focus_query(&self, fail: bool) {
        self.state().fail_focus = fail;
    }

    pub fn fail_injection(&self, fail: bool) {
        self.state().fail_injection = fail;
    }

    pub fn set_can_activate(&self, can_activate: bool) {
        self.state().can_activate = can_activate;
    }

    pub fn injections(&self) -> usize {
        self.state().injections
    }

    pub fn injected_into(&self) -> Vec<Option<String>> {
        self.state().injected_into.clone()
    }

    pub fn activations(&self) -> Vec<TargetProgram> {
        self.state().activations.clone()
    }
}

impl PlatformAdapter for FakePlatform {
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, PlatformError> {
        let state = self.state();
        if state.fail_listing {
            return Err(PlatformError::Query("process table unavailable".into()));
        }
        Ok(state.processes.clone())
    }

    fn focused_process_name(&self) -> Result<Option<String>, PlatformError> {
        let state = self.state();
        if state.fail_focus {
            return Err(PlatformError::Query("focus query failed".into()));
        }
        Ok(state.focused.clone())
    }

    fn activate_window(&self, program: &TargetProgram) -> Result<(), PlatformError> {
        let mut state = self.state();
        let running = state
            .processes
            .iter()
            .find(|p| matcher::matches(program.as_str(), &p.name))
            .map(|p| p.name.clone());

        match running {
            Some(name) if state.can_activate => {
                state.activations.push(program.clone());
                state.focused = Some(name);
                Ok(())
            }
            Some(_) | None => Err(PlatformError::WindowNotFound {
                program: program.to_string(),
            }),
        }
    }

    fn inject_save_shortcut(&self) -> Result<(), PlatformError> {
        let mut state = self.state();
        if state.fail_injection {
            return Err(PlatformError::Injection("injection refused".into()));
        }
        state.injections += 1;
        let focused = state.focused.clone();
        state.injected_into.push(focused);
        Ok(())
    }
}
