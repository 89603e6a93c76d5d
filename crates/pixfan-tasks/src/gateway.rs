//! Task queue abstraction
//!
//! A gateway accepts named HTTP tasks and promises at-least-once delivery to
//! the task's URL. The caller picks the task name; a queue that has already
//! seen a name refuses it with [`EnqueueError::AlreadyExists`].

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

pub type EnqueueResult<T> = std::result::Result<T, EnqueueError>;

#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error("Task {0} already exists")]
    AlreadyExists(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Queue API error ({status}): {message}")]
    QueueApi { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Fully qualified queue, `projects/{p}/locations/{l}/queues/{q}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePath {
    pub project: String,
    pub location: String,
    pub queue: String,
}

impl QueuePath {
    pub fn new(
        project: impl Into<String>,
        location: impl Into<String>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            location: location.into(),
            queue: queue.into(),
        }
    }

    /// Resource name of the queue, the parent of its tasks.
    pub fn parent(&self) -> String {
        format!(
            "projects/{}/locations/{}/queues/{}",
            self.project, self.location, self.queue
        )
    }

    pub fn task_name(&self, task_id: Uuid) -> String {
        format!("{}/tasks/{}", self.parent(), task_id)
    }
}

impl Display for QueuePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.parent())
    }
}

/// OIDC identity the queue attaches when calling the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcToken {
    pub service_account_email: String,
    pub audience: String,
}

/// A task delivered as `POST url` with `headers` and `body`.
#[derive(Debug, Clone)]
pub struct HttpTask {
    /// Full resource name, `{queue}/tasks/{id}`
    pub name: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub oidc: Option<OidcToken>,
}

impl HttpTask {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What the queue returned for an accepted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub name: String,
}

/// Durable, at-least-once delivery of named HTTP tasks.
#[async_trait]
pub trait TaskQueueGateway: Send + Sync {
    /// Enqueue one task. Implementations must not retry on the caller's
    /// behalf; a failure is reported as-is.
    async fn create_task(&self, task: HttpTask) -> EnqueueResult<TaskHandle>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_path_formats_resource_names() {
        let path = QueuePath::new("demo", "us-central1", "q1");
        assert_eq!(path.parent(), "projects/demo/locations/us-central1/queues/q1");

        let id = Uuid::parse_str("6f1c2d7e-8a1b-4c3d-9e0f-112233445566").unwrap();
        assert_eq!(
            path.task_name(id),
            "projects/demo/locations/us-central1/queues/q1/tasks/6f1c2d7e-8a1b-4c3d-9e0f-112233445566"
        );
    }

    #[test]
    fn header_lookup_ignores_case() {
        let task = HttpTask {
            name: "t".to_string(),
            url: "http://localhost/convert".to_string(),
            headers: vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: Bytes::new(),
            oidc: None,
        };
        assert_eq!(
            task.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        assert!(task.header("authorization").is_none());
    }
}
