//! Trigger context of a plan computation.
//!
//! The context is a plain struct so the selection rule stays a pure
//! function. The GitHub Actions loaders below only fill it in.

use crate::error::{Result, TestPlanError};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Event names GitHub Actions uses for pull requests.
const REVIEWABLE_EVENTS: &[&str] = &["pull_request", "pull_request_target"];

/// The event that invoked plan computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerContext {
    /// Whether the event is a change proposal under review.
    pub is_reviewable_change: bool,

    /// Labels attached to the proposal. Empty for direct events.
    pub labels: Vec<String>,
}

impl TriggerContext {
    /// A push, manual run or scheduled run.
    pub fn direct() -> Self {
        Self::default()
    }

    /// A change proposal carrying `labels`.
    pub fn reviewable_change<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            is_reviewable_change: true,
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Build a context from a GitHub event name and its payload.
    ///
    /// Labels are read from `pull_request.labels[].name`. Entries without a
    /// string name are skipped.
    pub fn from_github_event(event_name: &str, payload: Option<&Value>) -> Self {
        if !REVIEWABLE_EVENTS.contains(&event_name) {
            return Self::direct();
        }

        let labels = payload
            .and_then(|p| p["pull_request"]["labels"].as_array())
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|label| label["name"].as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            is_reviewable_change: true,
            labels,
        }
    }

    /// Build a context from an event name and an optional payload file.
    pub fn from_github_event_file(event_name: &str, event_path: Option<&Path>) -> Result<Self> {
        let payload = match event_path {
            Some(path) if REVIEWABLE_EVENTS.contains(&event_name) => {
                let text = std::fs::read_to_string(path)?;
                Some(serde_json::from_str::<Value>(&text)?)
            }
            _ => None,
        };

        let context = Self::from_github_event(event_name, payload.as_ref());
        debug!(
            event = event_name,
            reviewable = context.is_reviewable_change,
            labels = ?context.labels,
            "Resolved trigger context"
        );
        Ok(context)
    }

    /// Build a context from the `GITHUB_EVENT_NAME` and `GITHUB_EVENT_PATH`
    /// variables of a GitHub Actions job.
    pub fn from_github_env() -> Result<Self> {
        let event_name = std::env::var("GITHUB_EVENT_NAME")
            .map_err(|_| TestPlanError::Trigger("GITHUB_EVENT_NAME is not set".to_string()))?;
        let event_path = std::env::var_os("GITHUB_EVENT_PATH");
        Self::from_github_event_file(&event_name, event_path.as_deref().map(Path::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pull_request_payload() -> Value {
        json!({
            "action": "labeled",
            "pull_request": {
                "number": 42,
                "labels": [
                    { "id": 1, "name": "ci:full-matrix" },
                    { "id": 2, "name": "enhancement" },
                    { "id": 3 }
                ]
            }
        })
    }

    #[test]
    fn test_push_is_direct() {
        let context = TriggerContext::from_github_event("push", Some(&pull_request_payload()));
        assert_eq!(context, TriggerContext::direct());
    }

    #[test]
    fn test_workflow_dispatch_is_direct() {
        let context = TriggerContext::from_github_event("workflow_dispatch", None);
        assert!(!context.is_reviewable_change);
        assert!(context.labels.is_empty());
    }

    #[test]
    fn test_pull_request_labels() {
        let context =
            TriggerContext::from_github_event("pull_request", Some(&pull_request_payload()));
        assert!(context.is_reviewable_change);
        assert_eq!(context.labels, vec!["ci:full-matrix", "enhancement"]);
        assert!(context.has_label("enhancement"));
    }

    #[test]
    fn test_pull_request_target_is_reviewable() {
        let context = TriggerContext::from_github_event("pull_request_target", None);
        assert!(context.is_reviewable_change);
        assert!(context.labels.is_empty());
    }

    #[test]
    fn test_pull_request_without_labels_field() {
        let payload = json!({ "pull_request": { "number": 7 } });
        let context = TriggerContext::from_github_event("pull_request", Some(&payload));
        assert!(context.is_reviewable_change);
        assert!(context.labels.is_empty());
    }

    #[test]
    fn test_event_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, pull_request_payload().to_string()).unwrap();

        let context = TriggerContext::from_github_event_file("pull_request", Some(&path))
            .expect("event file failed");
        assert_eq!(context.labels.len(), 2);
    }

    #[test]
    fn test_event_file_not_read_for_push() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");

        let context = TriggerContext::from_github_event_file("push", Some(&missing))
            .expect("push should not read the payload");
        assert!(!context.is_reviewable_change);
    }

    #[test]
    fn test_event_file_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, "not json").unwrap();

        let err = TriggerContext::from_github_event_file("pull_request", Some(&path)).unwrap_err();
        assert!(matches!(err, TestPlanError::Json(_)));
    }
}
