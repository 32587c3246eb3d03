use crate::constants::*;
use crate::error::AppError;
use crate::models::TargetProgram;
use std::collections::BTreeSet;

/// Validate the reminder interval in seconds.
pub fn validate_interval_secs(interval_secs: u64) -> Result<u64, AppError> {
    if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&interval_secs) {
        return Err(AppError::InvalidInput {
            field: "interval_seconds",
            reason: format!("must be {MIN_INTERVAL_SECS}-{MAX_INTERVAL_SECS}"),
        });
    }
    Ok(interval_secs)
}

/// Validate a target program name.
pub fn validate_program_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput {
            field: "target_programs",
            reason: "program name cannot be empty".into(),
        });
    }
    if name.len() > MAX_PROGRAM_NAME_LEN {
        return Err(AppError::InvalidInput {
            field: "target_programs",
            reason: format!("program name cannot exceed {MAX_PROGRAM_NAME_LEN} characters"),
        });
    }
    Ok(name)
}

/// Validate and normalize the target list. Names that normalize to the same
/// program are kept once, in first-seen order.
pub fn validate_target_programs<S: AsRef<str>>(names: &[S]) -> Result<Vec<TargetProgram>, AppError> {
    let mut seen = BTreeSet::new();
    let mut programs = Vec::with_capacity(names.len());

    for name in names {
        let program = TargetProgram::new(validate_program_name(name.as_ref())?);
        if program.is_empty() {
            return Err(AppError::InvalidInput {
                field: "target_programs",
                reason: format!("'{}' does not name a program", name.as_ref()),
            });
        }
        if seen.insert(program.clone()) {
            programs.push(program);
        }
    }

    Ok(programs)
}

/// Validate a loop period. Zero would spin the loop.
pub fn validate_period(field: &'static str, period: u64) -> Result<u64, AppError> {
    if period == 0 {
        return Err(AppError::InvalidInput {
            field,
            reason: "must be positive".into(),
        });
    }
    Ok(period)
}

pub fn validate_queue_capacity(capacity: usize) -> Result<usize, AppError> {
    if capacity == 0 {
        return Err(AppError::InvalidInput {
            field: "event_queue_capacity",
            reason: "must be positive".into(),
        });
    }
    Ok(capacity)
}
