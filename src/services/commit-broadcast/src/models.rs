//! Webhook payload and response models
//!
//! Only the subset of the GitHub push payload the broadcaster actually uses is
//! modelled. Every field defaults when absent, so other well-formed events
//! (for example `ping`) parse and are then filtered out by kind.

use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchSnapshot;
use crate::error::{BroadcastError, BroadcastResult};

pub const PUSH_EVENT: &str = "push";

/// Parsed push delivery, event kind taken from the `X-GitHub-Event` header
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub event_kind: String,
    pub repository: Repository,
    pub commits: Vec<Commit>,
    pub git_ref: Option<String>,
    pub pusher: Option<Pusher>,
}

impl PushEvent {
    /// Parse a raw webhook body.
    pub fn parse(event_kind: &str, body: &[u8]) -> BroadcastResult<Self> {
        let payload: PushPayload = serde_json::from_slice(body)
            .map_err(|e| BroadcastError::invalid_payload(e.to_string()))?;

        Ok(Self {
            event_kind: event_kind.to_string(),
            repository: payload.repository,
            commits: payload.commits,
            git_ref: payload.git_ref,
            pusher: payload.pusher,
        })
    }

    /// Only pushes that carry at least one commit are broadcast.
    pub fn is_actionable(&self) -> bool {
        self.event_kind == PUSH_EVENT && !self.commits.is_empty()
    }
}

/// Wire shape of the push payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct PushPayload {
    #[serde(rename = "ref")]
    git_ref: Option<String>,
    repository: Repository,
    commits: Vec<Commit>,
    pusher: Option<Pusher>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub name: String,
    pub full_name: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Commit {
    pub id: String,
    pub message: String,
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
    pub author: Author,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub name: String,
    pub email: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pusher {
    pub name: String,
    pub email: Option<String>,
}

/// Acknowledgment returned to the webhook sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub message: String,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self {
            message: "Webhook received".to_string(),
        }
    }

    pub fn ignored() -> Self {
        Self {
            message: "Event ignored".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub mode: &'static str,
    pub version: &'static str,
    pub dispatch: DispatchSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_push_payload() {
        let body = json!({
            "ref": "refs/heads/main",
            "repository": {"name": "commitcast", "full_name": "acme/commitcast"},
            "pusher": {"name": "octocat", "email": "octocat@github.com"},
            "commits": [{
                "id": "a1b2c3",
                "message": "Add webhook router",
                "added": ["src/router.rs"],
                "modified": ["src/lib.rs", "Cargo.toml"],
                "removed": [],
                "author": {"name": "Octo Cat", "email": "octocat@github.com", "username": "octocat"},
                "timestamp": "2024-06-01T10:00:00Z"
            }]
        });

        let event = PushEvent::parse("push", body.to_string().as_bytes()).unwrap();
        assert_eq!(event.repository.name, "commitcast");
        assert_eq!(event.git_ref.as_deref(), Some("refs/heads/main"));
        assert_eq!(event.commits.len(), 1);
        assert_eq!(event.commits[0].modified.len(), 2);
        assert_eq!(event.commits[0].author.username.as_deref(), Some("octocat"));
        assert!(event.is_actionable());
    }

    #[test]
    fn test_non_push_events_parse_but_are_not_actionable() {
        let body = json!({"zen": "Keep it logically awesome.", "hook_id": 1});
        let event = PushEvent::parse("ping", body.to_string().as_bytes()).unwrap();
        assert!(event.commits.is_empty());
        assert!(!event.is_actionable());
    }

    #[test]
    fn test_push_without_commits_is_not_actionable() {
        let body = json!({"repository": {"name": "commitcast"}, "commits": []});
        let event = PushEvent::parse("push", body.to_string().as_bytes()).unwrap();
        assert!(!event.is_actionable());
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let result = PushEvent::parse("push", b"{not json");
        assert!(matches!(result, Err(BroadcastError::InvalidPayload { .. })));

        let result = PushEvent::parse("push", b"[1, 2, 3]");
        assert!(matches!(result, Err(BroadcastError::InvalidPayload { .. })));
    }
}
