use crate::error::PlatformError;
use crate::models::{ProcessEntry, TargetProgram};

/// OS services the engine needs: the process table, input focus, window
/// activation, and the save keystroke.
pub trait PlatformAdapter: Send + Sync {
    /// Every process with a readable name. Processes that vanish or deny access
    /// while the table is read are left out.
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, PlatformError>;

    /// Process name owning the window that currently has input focus.
    fn focused_process_name(&self) -> Result<Option<String>, PlatformError>;

    /// Bring a window belonging to `program` to the foreground.
    fn activate_window(&self, program: &TargetProgram) -> Result<(), PlatformError>;

    /// Press and release the platform save shortcut in the focused window.
    fn inject_save_shortcut(&self) -> Result<(), PlatformError>;
}
