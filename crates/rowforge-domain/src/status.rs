//! Status module - lifecycle states for tasks

/// Status in the task lifecycle
///
/// Tasks move through a small state machine:
/// - Pending: admitted, runner not yet driving it
/// - Processing: batches are being executed
/// - Completed: every row processed by every rule, output written
/// - Failed: unrecoverable error, partial output retained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Admitted but not started
    Pending,

    /// Batches in flight
    Processing,

    /// Terminal: final output durably written
    Completed,

    /// Terminal: unrecoverable error
    Failed,
}

impl TaskStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Parse a status from a string (internal use)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(TaskStatus::Pending),
            "processing" => Some(TaskStatus::Processing),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether the state machine allows moving to `next`
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid task status: {}", s))
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Processing));
        assert!(TaskStatus::Processing.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Processing.can_transition_to(TaskStatus::Failed));
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Failed));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for next in [
            TaskStatus::Pending,
            TaskStatus::Processing,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert!(!TaskStatus::Completed.can_transition_to(next));
            assert!(!TaskStatus::Failed.can_transition_to(next));
        }
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn test_parse_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Processing,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("PROCESSING"), Some(TaskStatus::Processing));
        assert!("bogus".parse::<TaskStatus>().is_err());
    }
}
