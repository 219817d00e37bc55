// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Run Status Interpreter
//!
//! Maps the condition report of an external workflow run onto [`RunStatus`].
//!
//! The workflow plane reports progress through a Kubernetes-style condition
//! list:
//!
//! ```json
//! {
//!   "status": {
//!     "conditions": [
//!       { "type": "WorkflowCompleted", "status": "False", "reason": "WorkflowRunning" }
//!     ]
//!   }
//! }
//! ```
//!
//! Only the `WorkflowCompleted` condition is consulted. Malformed entries are
//! skipped and missing data always reads as `Pending`, so interpretation never
//! fails.
//!
//! | `status` | `reason` | Result |
//! |----------|----------|--------|
//! | `True` | `WorkflowSucceeded` | Succeeded |
//! | `True` | anything else | Failed |
//! | `False` | `WorkflowRunning` | Running |
//! | `False` | `WorkflowPending` / none | Pending |
//! | `False` | other, with message | Failed |
//! | `False` | other, no message | Pending |
//! | other | any | Pending |

use serde_json::Value;

use crate::domain::monitor_run::RunStatus;

pub const WORKFLOW_COMPLETED_CONDITION: &str = "WorkflowCompleted";
pub const REASON_SUCCEEDED: &str = "WorkflowSucceeded";
pub const REASON_RUNNING: &str = "WorkflowRunning";
pub const REASON_PENDING: &str = "WorkflowPending";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Condition<'a> {
    status: &'a str,
    reason: Option<&'a str>,
    message: Option<&'a str>,
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn completed_condition(resource: &Value) -> Option<Condition<'_>> {
    resource
        .get("status")?
        .get("conditions")?
        .as_array()?
        .iter()
        .filter_map(Value::as_object)
        .find(|condition| {
            condition.get("type").and_then(Value::as_str) == Some(WORKFLOW_COMPLETED_CONDITION)
        })
        .map(|condition| Condition {
            status: condition.get("status").and_then(Value::as_str).unwrap_or_default(),
            reason: non_empty_str(condition.get("reason")),
            message: non_empty_str(condition.get("message")),
        })
}

/// Derive the run status from a workflow run resource document.
pub fn interpret_run_status(resource: &Value) -> RunStatus {
    let Some(condition) = completed_condition(resource) else {
        return RunStatus::Pending;
    };

    match condition.status {
        "True" => match condition.reason {
            Some(REASON_SUCCEEDED) => RunStatus::Succeeded,
            _ => RunStatus::Failed,
        },
        "False" => match condition.reason {
            Some(REASON_RUNNING) => RunStatus::Running,
            Some(REASON_PENDING) | None => RunStatus::Pending,
            // Unrecognised reason without a message is treated as still in progress
            Some(_) if condition.message.is_some() => RunStatus::Failed,
            Some(_) => RunStatus::Pending,
        },
        _ => RunStatus::Pending,
    }
}

/// Human readable summary of the `WorkflowCompleted` condition.
pub fn run_error_message(resource: &Value) -> String {
    match completed_condition(resource) {
        Some(Condition {
            reason: Some(reason),
            message: Some(message),
            ..
        }) => format!("{}: {}", reason, message),
        Some(Condition {
            reason: Some(reason),
            ..
        }) => reason.to_string(),
        Some(Condition {
            message: Some(message),
            ..
        }) => message.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource(conditions: Value) -> Value {
        json!({ "metadata": { "name": "run" }, "status": { "conditions": conditions } })
    }

    fn completed(status: &str, reason: Option<&str>, message: Option<&str>) -> Value {
        let mut condition = json!({ "type": WORKFLOW_COMPLETED_CONDITION, "status": status });
        if let Some(reason) = reason {
            condition["reason"] = json!(reason);
        }
        if let Some(message) = message {
            condition["message"] = json!(message);
        }
        resource(json!([condition]))
    }

    #[test]
    fn test_missing_data_is_pending() {
        for doc in [
            json!({}),
            json!(null),
            json!({ "status": {} }),
            json!({ "status": { "conditions": [] } }),
            json!({ "status": { "conditions": "not-a-list" } }),
            resource(json!([{ "type": "Ready", "status": "True" }])),
        ] {
            assert_eq!(interpret_run_status(&doc), RunStatus::Pending, "{}", doc);
            assert_eq!(run_error_message(&doc), "");
        }
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let doc = resource(json!([
            "garbage",
            42,
            { "type": 7 },
            { "type": WORKFLOW_COMPLETED_CONDITION, "status": "True", "reason": REASON_SUCCEEDED }
        ]));
        assert_eq!(interpret_run_status(&doc), RunStatus::Succeeded);
    }

    #[test]
    fn test_completed_true() {
        assert_eq!(
            interpret_run_status(&completed("True", Some(REASON_SUCCEEDED), None)),
            RunStatus::Succeeded
        );
        assert_eq!(
            interpret_run_status(&completed("True", Some("WorkflowFailed"), None)),
            RunStatus::Failed
        );
        assert_eq!(interpret_run_status(&completed("True", None, None)), RunStatus::Failed);
    }

    #[test]
    fn test_workflow_failed_message() {
        let doc = completed("True", Some("WorkflowFailed"), None);
        assert_eq!(interpret_run_status(&doc), RunStatus::Failed);
        assert_eq!(run_error_message(&doc), "WorkflowFailed");
    }

    #[test]
    fn test_completed_false() {
        assert_eq!(
            interpret_run_status(&completed("False", Some(REASON_RUNNING), None)),
            RunStatus::Running
        );
        assert_eq!(
            interpret_run_status(&completed("False", Some(REASON_PENDING), None)),
            RunStatus::Pending
        );
        assert_eq!(interpret_run_status(&completed("False", None, None)), RunStatus::Pending);
        assert_eq!(
            interpret_run_status(&completed("False", Some("ImagePullBackOff"), Some("image not found"))),
            RunStatus::Failed
        );
        assert_eq!(
            interpret_run_status(&completed("False", Some("ImagePullBackOff"), None)),
            RunStatus::Pending
        );
    }

    #[test]
    fn test_unknown_condition_status_is_pending() {
        assert_eq!(
            interpret_run_status(&completed("Unknown", Some("WorkflowFailed"), Some("boom"))),
            RunStatus::Pending
        );
    }

    #[test]
    fn test_error_message_formats() {
        assert_eq!(
            run_error_message(&completed("True", Some("WorkflowFailed"), Some("step 2 exited 1"))),
            "WorkflowFailed: step 2 exited 1"
        );
        assert_eq!(
            run_error_message(&completed("True", None, Some("step 2 exited 1"))),
            "step 2 exited 1"
        );
        assert_eq!(run_error_message(&completed("True", None, None)), "");
    }

    #[test]
    fn test_interpretation_is_deterministic() {
        let doc = completed("False", Some("Evicted"), Some("node drained"));
        let first = (interpret_run_status(&doc), run_error_message(&doc));
        for _ in 0..5 {
            assert_eq!((interpret_run_status(&doc), run_error_message(&doc)), first);
        }
    }
}
