use crate::constants::HISTORY_CAPACITY;
use crate::models::ReminderRecord;
use std::collections::VecDeque;

/// Fired reminders, newest first, capped at a fixed number of entries.
#[derive(Debug, Clone)]
pub struct ReminderHistoryLog {
    records: VecDeque<ReminderRecord>,
    capacity: usize,
}

impl Default for ReminderHistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ReminderHistoryLog {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the front, evicting the oldest record when over capacity.
    pub fn append(&mut self, record: ReminderRecord) {
        self.records.push_front(record);
        self.records.truncate(self.capacity);
    }

    /// Up to `n` most recent records, newest first.
    pub fn recent(&self, n: usize) -> Vec<ReminderRecord> {
        self.records.iter().take(n).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
