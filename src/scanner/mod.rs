use crate::error::PlatformError;
use crate::matcher::{matches_normalized, normalize};
use crate::models::{ProcessEntry, ProcessSnapshot, TargetProgram};
use crate::platform::PlatformAdapter;
use log::warn;
use std::sync::Arc;

/// Build a snapshot of which targets are running.
///
/// Each process is attributed to the first target it matches, and each target
/// keeps the first process that matched it.
pub fn match_processes(targets: &[TargetProgram], processes: &[ProcessEntry]) -> ProcessSnapshot {
    let mut snapshot = ProcessSnapshot::new();

    for process in processes {
        let name = normalize(&process.name);
        if name.is_empty() {
            continue;
        }

        let matched = targets
            .iter()
            .find(|target| !snapshot.contains(target) && matches_normalized(target.as_str(), &name));

        if let Some(target) = matched {
            snapshot.insert(target.clone(), process.pid);
        }

        if snapshot.len() == targets.len() {
            break;
        }
    }

    snapshot
}

pub struct ProcessScanner {
    platform: Arc<dyn PlatformAdapter>,
}

impl ProcessScanner {
    pub fn new(platform: Arc<dyn PlatformAdapter>) -> Self {
        Self { platform }
    }

    pub fn try_scan(&self, targets: &[TargetProgram]) -> Result<ProcessSnapshot, PlatformError> {
        let processes = self.platform.list_processes()?;
        Ok(match_processes(targets, &processes))
    }

    /// Scan the process table, keeping `previous` if the table cannot be read.
    pub fn scan(&self, targets: &[TargetProgram], previous: &ProcessSnapshot) -> ProcessSnapshot {
        match self.try_scan(targets) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Process scan failed, keeping previous snapshot: {e}");
                previous.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakePlatform;

    fn targets(names: &[&str]) -> Vec<TargetProgram> {
        names.iter().map(|n| TargetProgram::new(n)).collect()
    }

    #[test]
    fn test_match_processes_basic() {
        let processes = vec![
            ProcessEntry::new(1, "systemd"),
            ProcessEntry::new(200, "Code.exe"),
            ProcessEntry::new(300, "notepad++.exe"),
        ];
        let snapshot = match_processes(&targets(&["code.exe", "notepad"]), &processes);

        assert_eq!(snapshot.pid(&TargetProgram::new("code")), Some(200));
        assert_eq!(snapshot.pid(&TargetProgram::new("notepad")), Some(300));
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_first_match_wins_per_target() {
        let processes = vec![ProcessEntry::new(10, "code"), ProcessEntry::new(11, "code")];
        let snapshot = match_processes(&targets(&["code"]), &processes);
        assert_eq!(snapshot.pid(&TargetProgram::new("code")), Some(10));
    }

    #[test]
    fn test_process_attributed_to_one_target() {
        // "code" and "vscode" both match the process; only the first target takes it
        let processes = vec![ProcessEntry::new(5, "vscode")];
        let snapshot = match_processes(&targets(&["code", "vscode"]), &processes);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains(&TargetProgram::new("code")));
    }

    #[test]
    fn test_nameless_processes_are_skipped() {
        let processes = vec![ProcessEntry::new(1, ""), ProcessEntry::new(2, "  ")];
        assert!(match_processes(&targets(&["code"]), &processes).is_empty());
    }

    #[test]
    fn test_no_targets_yields_empty_snapshot() {
        let processes = vec![ProcessEntry::new(1, "code")];
        assert!(match_processes(&[], &processes).is_empty());
    }

    #[test]
    fn test_scan_uses_platform_table() {
        let platform = Arc::new(FakePlatform::new());
        platform.set_processes(&[(42, "code.exe")]);
        let scanner = ProcessScanner::new(platform);

        let snapshot = scanner.scan(&targets(&["code"]), &ProcessSnapshot::new());
        assert_eq!(snapshot.pid(&TargetProgram::new("code")), Some(42));
    }

    #[test]
    fn test_scan_failure_keeps_previous_snapshot() {
        let platform = Arc::new(FakePlatform::new());
        platform.fail_process_listing(true);
        let scanner = ProcessScanner::new(platform);

        let previous: ProcessSnapshot = [(TargetProgram::new("code"), 7)].into_iter().collect();
        let snapshot = scanner.scan(&targets(&["code"]), &previous);

        assert_eq!(snapshot, previous);
        assert!(scanner.try_scan(&targets(&["code"])).is_err());
    }
}
