//! Terminal result of a script step.
//!
//! An [`Outcome`] is built exactly once per invocation, at whichever
//! terminal branch is reached first, and never mutated afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reason recorded when the caller cancels a running step.
pub const CANCELED_REASON: &str = "execution canceled";

/// Step status as exchanged with the job runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Success,
    Fail,
    Unknown,
}

impl Status {
    /// Literal status string understood by the job runner.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Fail => "Fail",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status plus a free-text reason (empty on success).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: Status,
    pub reason: String,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            status: Status::Success,
            reason: String::new(),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            status: Status::Fail,
            reason: reason.into(),
        }
    }

    /// Outcome returned when the cancellation signal wins the race.
    pub fn canceled() -> Self {
        Self::failure(CANCELED_REASON)
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_match_runner_contract() {
        assert_eq!(Status::Success.as_str(), "Success");
        assert_eq!(Status::Fail.as_str(), "Fail");
        assert_eq!(Status::Unknown.as_str(), "Unknown");
        assert_eq!(Status::Fail.to_string(), "Fail");
    }

    #[test]
    fn success_has_empty_reason() {
        let outcome = Outcome::success();
        assert!(outcome.is_success());
        assert!(outcome.reason.is_empty());
    }

    #[test]
    fn canceled_outcome() {
        let outcome = Outcome::canceled();
        assert_eq!(outcome.status, Status::Fail);
        assert_eq!(outcome.reason, "execution canceled");
        assert!(!outcome.is_success());
    }

    #[test]
    fn serializes_with_literal_status() {
        let json = serde_json::to_value(Outcome::failure("exit status: 2")).expect("serialize");
        assert_eq!(json["status"], "Fail");
        assert_eq!(json["reason"], "exit status: 2");
    }
}
