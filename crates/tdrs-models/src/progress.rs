use serde::{Deserialize, Serialize};

use crate::run_state::RunSummary;

/// Ordered events emitted over the run's progress stream.
///
/// A well-formed stream is zero or more `processing` events, at most one
/// `executing`, then exactly one terminal `complete` or `error`. No event
/// follows a terminal one for the same run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressEvent {
    Processing {
        agent: String,
        step: u32,
        total: u32,
    },
    Executing,
    Complete {
        result: Box<RunSummary>,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Complete { .. } | ProgressEvent::Error { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_event_serializes_with_status_tag() {
        let event = ProgressEvent::Processing {
            agent: "bull_researcher".to_string(),
            step: 5,
            total: 12,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "processing");
        assert_eq!(json["agent"], "bull_researcher");
        assert_eq!(json["step"], 5);
    }

    #[test]
    fn error_event_is_terminal() {
        let event = ProgressEvent::Error {
            message: "model unavailable".to_string(),
        };
        assert!(event.is_terminal());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "error");
    }

    #[test]
    fn executing_is_not_terminal() {
        assert!(!ProgressEvent::Executing.is_terminal());
    }
}
