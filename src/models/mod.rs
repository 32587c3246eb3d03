pub mod program;
pub mod reminder;

pub use program::{ProcessEntry, ProcessSnapshot, TargetProgram};
pub use reminder::{MessageKey, ReminderKind, ReminderRecord};
