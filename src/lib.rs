pub mod autosave;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod hourly;
pub mod lifecycle;
pub mod matcher;
pub mod models;
pub mod monitor;
pub mod platform;
pub mod scanner;
pub mod scheduler;
#[cfg(test)]
mod test_utils;
pub mod validation;
pub mod worker;

pub use config::EngineConfig;
pub use engine::{EngineStatus, SaveGuardEngine};
pub use error::{AppError, PlatformError};
pub use events::{EngineEvent, Subscription};
