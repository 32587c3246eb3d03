#![allow(unsafe_code, reason = "Win32 window and input APIs are only reachable through FFI")]

use super::{PlatformAdapter, ProcessTable};
use crate::error::PlatformError;
use crate::matcher;
use crate::models::{ProcessEntry, TargetProgram};
use ::windows::Win32::Foundation::{BOOL, HWND, LPARAM, TRUE};
use ::windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS, KEYEVENTF_KEYUP,
    VIRTUAL_KEY, VK_CONTROL,
};
use ::windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetForegroundWindow, GetWindowThreadProcessId, IsIconic, IsWindowVisible,
    SetForegroundWindow, ShowWindow, SW_RESTORE,
};
use log::{debug, warn};
use std::collections::HashMap;
use std::mem::size_of;

const VK_S: VIRTUAL_KEY = VIRTUAL_KEY(0x53);

fn query_err(e: impl std::fmt::Display) -> PlatformError {
    PlatformError::Query(e.to_string())
}

fn injection_err(e: impl std::fmt::Display) -> PlatformError {
    PlatformError::Injection(e.to_string())
}

fn window_pid(window: HWND) -> Option<u32> {
    let mut pid = 0u32;
    // SAFETY: `pid` outlives the call; an invalid handle yields 0
    let thread = unsafe { GetWindowThreadProcessId(window, Some(std::ptr::addr_of_mut!(pid))) };
    (thread != 0 && pid != 0).then_some(pid)
}

#[allow(clippy::as_conversions, reason = "LPARAM carries the collector pointer")]
unsafe extern "system" fn collect_visible(window: HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: `lparam` is the `Vec<HWND>` owned by `visible_windows`, alive for the whole enumeration
    let windows = unsafe { &mut *(lparam.0 as *mut Vec<HWND>) };
    if unsafe { IsWindowVisible(window) }.as_bool() {
        windows.push(window);
    }
    TRUE
}

/// Visible top-level windows in z-order.
#[allow(clippy::as_conversions, reason = "LPARAM carries the collector pointer")]
fn visible_windows() -> Result<Vec<HWND>, PlatformError> {
    let mut windows: Vec<HWND> = Vec::new();
    let lparam = LPARAM(std::ptr::addr_of_mut!(windows) as isize);
    // SAFETY: the callback only touches `windows`, which outlives the call
    unsafe { EnumWindows(Some(collect_visible), lparam) }.map_err(query_err)?;
    Ok(windows)
}

fn key_input(key: VIRTUAL_KEY, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: key,
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

pub struct WindowsPlatform {
    processes: ProcessTable,
}

impl Default for WindowsPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowsPlatform {
    pub fn new() -> Self {
        Self {
            processes: ProcessTable::new(),
        }
    }

    fn find_window_for(&self, program: &TargetProgram) -> Result<Option<HWND>, PlatformError> {
        let names: HashMap<u32, String> = self
            .processes
            .list()?
            .into_iter()
            .map(|entry| (entry.pid, entry.name))
            .collect();

        for window in visible_windows()? {
            let Some(pid) = window_pid(window) else {
                continue;
            };
            match names.get(&pid) {
                Some(name) if matcher::matches(program.as_str(), name) => return Ok(Some(window)),
                Some(_) => {}
                None => debug!("Skipping window of unknown pid {pid}"),
            }
        }

        Ok(None)
    }
}

impl PlatformAdapter for WindowsPlatform {
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, PlatformError> {
        self.processes.list()
    }

    fn focused_process_name(&self) -> Result<Option<String>, PlatformError> {
        // SAFETY: no arguments; a null handle means no window has focus
        let window = unsafe { GetForegroundWindow() };
        if window.0.is_null() {
            return Ok(None);
        }
        Ok(window_pid(window).and_then(|pid| self.processes.name_of(pid)))
    }

    fn activate_window(&self, program: &TargetProgram) -> Result<(), PlatformError> {
        let window = self
            .find_window_for(program)?
            .ok_or_else(|| PlatformError::WindowNotFound {
                program: program.to_string(),
            })?;

        // SAFETY: `window` came from EnumWindows; stale handles make these calls fail, not crash
        unsafe {
            if IsIconic(window).as_bool() {
                let _ = ShowWindow(window, SW_RESTORE);
            }
            if !SetForegroundWindow(window).as_bool() {
                // Windows refuses focus changes while another process holds the foreground lock
                warn!("Foreground change to {program} was refused");
                return Err(PlatformError::Unavailable("foreground change refused".into()));
            }
        }

        debug!("Activated window {window:?} for {program}");
        Ok(())
    }

    fn inject_save_shortcut(&self) -> Result<(), PlatformError> {
        let inputs = [
            key_input(VK_CONTROL, KEYBD_EVENT_FLAGS::default()),
            key_input(VK_S, KEYBD_EVENT_FLAGS::default()),
            key_input(VK_S, KEYEVENTF_KEYUP),
            key_input(VK_CONTROL, KEYEVENTF_KEYUP),
        ];
        let size = i32::try_from(size_of::<INPUT>()).map_err(injection_err)?;

        // SAFETY: `inputs` is a valid slice of keyboard INPUT records of `size` bytes each
        let sent = unsafe { SendInput(&inputs, size) };
        if usize::try_from(sent).ok() != Some(inputs.len()) {
            return Err(PlatformError::Injection(format!(
                "only {sent} of {} key events were accepted",
                inputs.len()
            )));
        }
        Ok(())
    }
}
