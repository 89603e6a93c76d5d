//! Fan-out dispatch
//!
//! One validated upload event becomes one conversion task per requested
//! format, enqueued in list order. The first failure stops the loop; tasks
//! already accepted by the queue stay there (they are independent and safe to
//! run) and are reported back in the error.

use bytes::Bytes;
use pixfan_core::constants::{CONVERT_PATH, FORM_CONTENT_TYPE};
use pixfan_core::{ConversionPayload, DispatchConfig, TargetFormat, UploadEvent};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::gateway::{EnqueueError, HttpTask, OidcToken, QueuePath, TaskQueueGateway};

/// Where tasks go and how the target authenticates them.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub queue: QueuePath,
    /// Conversion service base URL, also the OIDC audience
    pub run_url: String,
    pub service_account: Option<String>,
}

impl DispatchSettings {
    pub fn target_url(&self) -> String {
        format!("{}{}", self.run_url, CONVERT_PATH)
    }
}

impl From<&DispatchConfig> for DispatchSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            queue: QueuePath::new(&config.project, &config.location, &config.queue),
            run_url: config.run_url.clone(),
            service_account: config.service_account.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DispatchedTask {
    pub task_name: String,
    pub format: TargetFormat,
    /// Output object the task will write
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DispatchReport {
    pub source: String,
    pub tasks: Vec<DispatchedTask>,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to enqueue {format} conversion ({} task(s) already enqueued): {source}", .enqueued.len())]
    Enqueue {
        format: TargetFormat,
        enqueued: Vec<DispatchedTask>,
        #[source]
        source: EnqueueError,
    },
}

pub struct FanOutDispatcher {
    gateway: Arc<dyn TaskQueueGateway>,
    settings: DispatchSettings,
}

impl FanOutDispatcher {
    pub fn new(gateway: Arc<dyn TaskQueueGateway>, settings: DispatchSettings) -> Self {
        Self { gateway, settings }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    fn build_task(&self, task_id: Uuid, payload: &ConversionPayload) -> HttpTask {
        let oidc = self
            .settings
            .service_account
            .as_ref()
            .map(|email| OidcToken {
                service_account_email: email.clone(),
                audience: self.settings.run_url.clone(),
            });

        HttpTask {
            name: self.settings.queue.task_name(task_id),
            url: self.settings.target_url(),
            headers: vec![("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string())],
            body: Bytes::from(payload.to_form_body()),
            oidc,
        }
    }

    /// Enqueue one conversion per format of `event`, in order, failing fast.
    #[tracing::instrument(
        skip(self, event),
        fields(
            source = %event.source_key(),
            output = %event.output_name(),
            formats = event.formats().len(),
            backend = self.gateway.backend_name()
        )
    )]
    pub async fn dispatch(&self, event: &UploadEvent) -> Result<DispatchReport, DispatchError> {
        let mut enqueued = Vec::with_capacity(event.formats().len());

        for &format in event.formats() {
            let payload = ConversionPayload {
                format,
                source: event.source_key().to_string(),
                name: format.output_name(event.output_name()),
            };
            let task = self.build_task(Uuid::new_v4(), &payload);

            match self.gateway.create_task(task).await {
                Ok(handle) => {
                    tracing::info!(
                        task.name = %handle.name,
                        format = %format,
                        name = %payload.name,
                        "Conversion task enqueued"
                    );
                    enqueued.push(DispatchedTask {
                        task_name: handle.name,
                        format,
                        name: payload.name,
                    });
                }
                Err(source) => {
                    tracing::error!(
                        format = %format,
                        error = %source,
                        enqueued = enqueued.len(),
                        "Fan-out stopped on enqueue failure"
                    );
                    return Err(DispatchError::Enqueue {
                        format,
                        enqueued,
                        source,
                    });
                }
            }
        }

        Ok(DispatchReport {
            source: event.source_key().to_string(),
            tasks: enqueued,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{EnqueueResult, TaskHandle};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records every task; fails the call with the given index.
    #[derive(Default)]
    struct RecordingGateway {
        tasks: Mutex<Vec<HttpTask>>,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl TaskQueueGateway for RecordingGateway {
        async fn create_task(&self, task: HttpTask) -> EnqueueResult<TaskHandle> {
            let mut tasks = self.tasks.lock().unwrap();
            let index = tasks.len();
            let name = task.name.clone();
            tasks.push(task);
            if self.fail_at == Some(index) {
                return Err(EnqueueError::QueueApi {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            Ok(TaskHandle { name })
        }

        fn backend_name(&self) -> &'static str {
            "recording"
        }
    }

    fn settings() -> DispatchSettings {
        DispatchSettings {
            queue: QueuePath::new("demo", "us-central1", "q1"),
            run_url: "https://convert.example".to_string(),
            service_account: Some("tasks@demo.iam.gserviceaccount.com".to_string()),
        }
    }

    fn body_of(task: &HttpTask) -> String {
        String::from_utf8(task.body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn one_task_per_format_in_order() {
        let gateway = Arc::new(RecordingGateway::default());
        let dispatcher = FanOutDispatcher::new(gateway.clone(), settings());
        let event = UploadEvent::new("photo1", "out1", "jpeg,webp").unwrap();

        let report = dispatcher.dispatch(&event).await.unwrap();

        let tasks = gateway.tasks.lock().unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(body_of(&tasks[0]), "format=jpeg&source=photo1&name=out1.jpeg");
        assert_eq!(body_of(&tasks[1]), "format=webp&source=photo1&name=out1.webp");

        for task in tasks.iter() {
            assert_eq!(task.url, "https://convert.example/convert");
            assert_eq!(task.header("content-type"), Some(FORM_CONTENT_TYPE));
            assert!(task
                .name
                .starts_with("projects/demo/locations/us-central1/queues/q1/tasks/"));
            let oidc = task.oidc.as_ref().unwrap();
            assert_eq!(oidc.service_account_email, "tasks@demo.iam.gserviceaccount.com");
            assert_eq!(oidc.audience, "https://convert.example");
        }

        let names: Vec<_> = report.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["out1.jpeg", "out1.webp"]);
        assert_eq!(report.source, "photo1");
    }

    #[tokio::test]
    async fn task_ids_are_fresh_for_every_dispatch() {
        let gateway = Arc::new(RecordingGateway::default());
        let dispatcher = FanOutDispatcher::new(gateway.clone(), settings());
        let event = UploadEvent::new("photo1", "out1", "jpeg,webp,png,avif").unwrap();

        dispatcher.dispatch(&event).await.unwrap();
        dispatcher.dispatch(&event).await.unwrap();

        let tasks = gateway.tasks.lock().unwrap();
        let names: HashSet<_> = tasks.iter().map(|t| t.name.clone()).collect();
        assert_eq!(tasks.len(), 8);
        assert_eq!(names.len(), 8);
    }

    #[tokio::test]
    async fn partial_failure_keeps_earlier_tasks_and_stops() {
        let gateway = Arc::new(RecordingGateway {
            fail_at: Some(1),
            ..Default::default()
        });
        let dispatcher = FanOutDispatcher::new(gateway.clone(), settings());
        let event = UploadEvent::new("photo1", "out1", "jpeg,webp,png").unwrap();

        let err = dispatcher.dispatch(&event).await.unwrap_err();
        let DispatchError::Enqueue {
            format, enqueued, ..
        } = err;
        assert_eq!(format, TargetFormat::Webp);
        assert_eq!(enqueued.len(), 1);
        assert_eq!(enqueued[0].name, "out1.jpeg");

        // The third format was never attempted.
        assert_eq!(gateway.tasks.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn no_oidc_without_service_account() {
        let gateway = Arc::new(RecordingGateway::default());
        let mut settings = settings();
        settings.service_account = None;
        let dispatcher = FanOutDispatcher::new(gateway.clone(), settings);

        let event = UploadEvent::new("photo1", "out1", "png").unwrap();
        dispatcher.dispatch(&event).await.unwrap();

        assert!(gateway.tasks.lock().unwrap()[0].oidc.is_none());
    }
}
