use crate::matcher::normalize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A watched program, identified by its normalized name.
///
/// Construction lower-cases the name and strips a trailing `.exe`, so
/// `Code.exe` and `code` are the same target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TargetProgram(String);

impl TargetProgram {
    pub fn new(name: &str) -> Self {
        Self(normalize(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for TargetProgram {
    fn from(name: String) -> Self {
        Self::new(&name)
    }
}

impl From<&str> for TargetProgram {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<TargetProgram> for String {
    fn from(program: TargetProgram) -> Self {
        program.0
    }
}

impl AsRef<str> for TargetProgram {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A process observed in the OS process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
}

impl ProcessEntry {
    pub fn new(pid: u32, name: &str) -> Self {
        Self {
            pid,
            name: name.to_string(),
        }
    }
}

/// Running target programs and the pid each one was matched to.
///
/// A snapshot is rebuilt from scratch on every scan and replaces the previous
/// one wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSnapshot {
    entries: BTreeMap<TargetProgram, u32>,
}

impl ProcessSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `program` as running with `pid`. Returns false if the program was
    /// already recorded, in which case the first pid is kept.
    pub fn insert(&mut self, program: TargetProgram, pid: u32) -> bool {
        if self.entries.contains_key(&program) {
            return false;
        }
        self.entries.insert(program, pid);
        true
    }

    pub fn contains(&self, program: &TargetProgram) -> bool {
        self.entries.contains_key(program)
    }

    pub fn pid(&self, program: &TargetProgram) -> Option<u32> {
        self.entries.get(program).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn programs(&self) -> impl Iterator<Item = &TargetProgram> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TargetProgram, u32)> {
        self.entries.iter().map(|(program, pid)| (program, *pid))
    }
}

impl FromIterator<(TargetProgram, u32)> for ProcessSnapshot {
    fn from_iter<I: IntoIterator<Item = (TargetProgram, u32)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (program, pid) in iter {
            snapshot.insert(program, pid);
        }
        snapshot
    }
}
