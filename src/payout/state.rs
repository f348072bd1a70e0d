//! Payout Task State Definitions
//!
//! States are stored as TEXT in `payout_tasks.status`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Payout task states
///
/// ```text
/// PENDING → PROCESSING → COMPLETED
///                 ↓
///               FAILED
/// ```
///
/// Terminal: COMPLETED, FAILED. The only backward edge is the opt-in stale
/// reclaim PROCESSING → PENDING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Enqueued by a committed transfer, waiting for a worker
    Pending,
    /// Claimed by a worker; provider call in flight
    Processing,
    /// Terminal: provider confirmed the payout
    Completed,
    /// Terminal: provider rejected or errored, `last_error` is set
    Failed,
}

impl TaskStatus {
    /// Forward transitions of the base state machine
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "PROCESSING" => Ok(TaskStatus::Processing),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "FAILED" => Ok(TaskStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_have_no_exits() {
        let all = [
            TaskStatus::Pending,
            TaskStatus::Processing,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ];
        for terminal in [TaskStatus::Completed, TaskStatus::Failed] {
            assert!(all.iter().all(|next| !terminal.can_transition_to(*next)));
        }
    }

    #[test]
    fn test_unknown_status_error_message() {
        let err = "SETTLED".parse::<TaskStatus>().unwrap_err();
        assert_eq!(err, UnknownStatus("SETTLED".to_string()));
        assert_eq!(err.to_string(), "unknown task status: SETTLED");
    }

    #[test]
    fn test_transitions_are_monotonic() {
        use TaskStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Failed));
    }

    #[test]
    fn test_parse() {
        assert_eq!("PENDING".parse::<TaskStatus>(), Ok(TaskStatus::Pending));
        assert_eq!("FAILED".parse::<TaskStatus>(), Ok(TaskStatus::Failed));
        assert!("pending".parse::<TaskStatus>().is_err());
        assert!("RETRYING".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(TaskStatus::Processing.to_string(), "PROCESSING");
        assert_eq!(TaskStatus::Completed.to_string(), "COMPLETED");
    }
}
