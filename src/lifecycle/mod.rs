use crate::models::{ProcessSnapshot, TargetProgram};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started { program: TargetProgram, pid: u32 },
    Stopped { program: TargetProgram },
}

/// Programs that appeared and disappeared between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleDiff {
    pub started: Vec<(TargetProgram, u32)>,
    pub stopped: Vec<TargetProgram>,
}

impl LifecycleDiff {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty()
    }

    /// Stop events first, then start events.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        let stopped = self.stopped.iter().map(|program| LifecycleEvent::Stopped {
            program: program.clone(),
        });
        let started = self.started.iter().map(|(program, pid)| LifecycleEvent::Started {
            program: program.clone(),
            pid: *pid,
        });
        stopped.chain(started).collect()
    }
}

pub fn diff(previous: &ProcessSnapshot, current: &ProcessSnapshot) -> LifecycleDiff {
    let started = current
        .iter()
        .filter(|(program, _)| !previous.contains(program))
        .map(|(program, pid)| (program.clone(), pid))
        .collect();

    let stopped = previous
        .programs()
        .filter(|program| !current.contains(program))
        .cloned()
        .collect();

    LifecycleDiff { started, stopped }
}

/// Holds the last snapshot and turns each new one into lifecycle changes.
#[derive(Debug, Default)]
pub struct LifecycleTracker {
    previous: ProcessSnapshot,
}

impl LifecycleTracker {
    /// Starts from an empty snapshot, so the first advance reports every
    /// running target as started.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored snapshot with `current` and report what changed.
    pub fn advance(&mut self, current: ProcessSnapshot) -> LifecycleDiff {
        let changes = diff(&self.previous, &current);
        self.previous = current;
        changes
    }

    pub fn snapshot(&self) -> &ProcessSnapshot {
        &self.previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, u32)]) -> ProcessSnapshot {
        entries
            .iter()
            .map(|(name, pid)| (TargetProgram::new(name), *pid))
            .collect()
    }

    #[test]
    fn test_diff_started_and_stopped() {
        let previous = snapshot(&[("code", 1), ("word", 2)]);
        let current = snapshot(&[("word", 2), ("excel", 3)]);

        let changes = diff(&previous, &current);
        assert_eq!(changes.started, vec![(TargetProgram::new("excel"), 3)]);
        assert_eq!(changes.stopped, vec![TargetProgram::new("code")]);
    }

    #[test]
    fn test_diff_sets_are_disjoint() {
        let sequence = [
            snapshot(&[]),
            snapshot(&[("code", 1)]),
            snapshot(&[("code", 1), ("word", 2)]),
            snapshot(&[("word", 2)]),
            snapshot(&[("code", 9)]),
            snapshot(&[]),
        ];

        for pair in sequence.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);
            let changes = diff(previous, current);
            for (program, _) in &changes.started {
                assert!(!previous.contains(program));
                assert!(!changes.stopped.contains(program));
            }
            for program in &changes.stopped {
                assert!(!current.contains(program));
            }
        }
    }

    #[test]
    fn test_pid_change_is_not_a_lifecycle_event() {
        let changes = diff(&snapshot(&[("code", 1)]), &snapshot(&[("code", 2)]));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_first_advance_reports_running_programs() {
        let mut tracker = LifecycleTracker::new();
        let changes = tracker.advance(snapshot(&[("code", 1), ("word", 2)]));
        assert_eq!(changes.started.len(), 2);
        assert!(changes.stopped.is_empty());
    }

    #[test]
    fn test_advance_replaces_snapshot() {
        let mut tracker = LifecycleTracker::new();
        tracker.advance(snapshot(&[("code", 1)]));
        let changes = tracker.advance(snapshot(&[("code", 1)]));
        assert!(changes.is_empty());

        let changes = tracker.advance(snapshot(&[]));
        assert_eq!(changes.stopped, vec![TargetProgram::new("code")]);
        assert!(tracker.snapshot().is_empty());
    }

    #[test]
    fn test_events_list_stops_before_starts() {
        let changes = diff(&snapshot(&[("code", 1)]), &snapshot(&[("word", 2)]));
        let events = changes.events();
        assert_eq!(
            events,
            vec![
                LifecycleEvent::Stopped { program: TargetProgram::new("code") },
                LifecycleEvent::Started { program: TargetProgram::new("word"), pid: 2 },
            ]
        );
    }
}
