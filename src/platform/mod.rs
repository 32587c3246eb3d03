pub mod process_table;
pub mod types;

pub use process_table::ProcessTable;
pub use types::PlatformAdapter;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "macos")]
pub use macos::MacOSPlatform as NativePlatform;

#[cfg(target_os = "linux")]
pub use linux::LinuxPlatform as NativePlatform;

#[cfg(target_os = "windows")]
pub use self::windows::WindowsPlatform as NativePlatform;

use std::sync::Arc;

/// Adapter for the platform this binary was built for.
pub fn native() -> Arc<dyn PlatformAdapter> {
    Arc::new(NativePlatform::new())
}

// Process monitoring only on other platforms
#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
pub struct NativePlatform {
    processes: ProcessTable,
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
impl NativePlatform {
    pub fn new() -> Self {
        Self {
            processes: ProcessTable::new(),
        }
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
impl PlatformAdapter for NativePlatform {
    fn list_processes(&self) -> Result<Vec<crate::models::ProcessEntry>, crate::error::PlatformError> {
        self.processes.list()
    }

    fn focused_process_name(&self) -> Result<Option<String>, crate::error::PlatformError> {
        Err(crate::error::PlatformError::Unsupported { operation: "focus query" })
    }

    fn activate_window(
        &self,
        _program: &crate::models::TargetProgram,
    ) -> Result<(), crate::error::PlatformError> {
        Err(crate::error::PlatformError::Unsupported { operation: "window activation" })
    }

    fn inject_save_shortcut(&self) -> Result<(), crate::error::PlatformError> {
        Err(crate::error::PlatformError::Unsupported { operation: "save shortcut injection" })
    }
}
