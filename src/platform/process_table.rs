use crate::error::PlatformError;
use crate::models::ProcessEntry;
use log::warn;
use std::sync::{Mutex, MutexGuard};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Process table reader shared by every platform adapter.
pub struct ProcessTable {
    system: Mutex<System>,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    fn lock_system(&self) -> MutexGuard<'_, System> {
        match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("ProcessTable: system mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Refresh and list all processes, ordered by pid.
    pub fn list(&self) -> Result<Vec<ProcessEntry>, PlatformError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(PlatformError::Unsupported {
                operation: "process enumeration",
            });
        }

        let mut system = self.lock_system();
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::new());

        let mut entries: Vec<ProcessEntry> = system
            .processes()
            .iter()
            .filter_map(|(pid, process)| {
                // Names that are not valid UTF-8 cannot match a target
                let name = process.name().to_str()?;
                if name.is_empty() {
                    return None;
                }
                Some(ProcessEntry::new(pid.as_u32(), name))
            })
            .collect();

        entries.sort_by_key(|entry| entry.pid);
        Ok(entries)
    }

    /// Name of a single process, refreshing only that pid.
    pub fn name_of(&self, pid: u32) -> Option<String> {
        let pid = Pid::from_u32(pid);
        let mut system = self.lock_system();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::new(),
        );

        system
            .process(pid)
            .and_then(|process| process.name().to_str())
            .map(str::to_string)
    }
}
