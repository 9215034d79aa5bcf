//! Command implementations.

pub mod export;
pub mod inspect;
pub mod run;
pub mod tasks;

pub use self::export::execute_export;
pub use self::inspect::execute_inspect;
pub use self::run::{execute_resume, execute_run, follow};
pub use self::tasks::{execute_delete, execute_list, execute_status};

use crate::error::{CliError, Result};
use rowforge_domain::TaskId;

/// Parse a task ID argument.
pub fn parse_task_id(value: &str) -> Result<TaskId> {
    TaskId::from_string(value.trim()).map_err(CliError::InvalidInput)
}
