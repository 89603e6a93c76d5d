use anyhow::{bail, Context};
use pixfan_core::{Config, ObjectFinalizedEvent, TaskQueueBackend, UploadEvent};
use pixfan_tasks::{cloud_tasks_gateway, DispatchSettings, FanOutDispatcher};
use std::sync::Arc;

/// Parse an object-finalized event (the storage notification JSON) and
/// validate its trigger metadata.
pub fn parse_event(json: &str) -> anyhow::Result<UploadEvent> {
    let event: ObjectFinalizedEvent =
        serde_json::from_str(json).context("Event is not valid object JSON")?;
    let upload = UploadEvent::try_from(event).context("Event cannot be dispatched")?;
    Ok(upload)
}

/// Build a Cloud Tasks dispatcher from environment configuration.
///
/// The local queue only delivers inside a running API process, so a CLI
/// dispatch through it would enqueue into a queue that exits with the command.
pub fn dispatcher_from_config(config: &Config) -> anyhow::Result<FanOutDispatcher> {
    if config.task_queue_backend == TaskQueueBackend::Local {
        bail!("TASK_QUEUE_BACKEND=local cannot be used from the CLI; use cloud-tasks");
    }
    let dispatch = config
        .dispatch
        .as_ref()
        .context("RUN_URL is not set; nothing to dispatch to")?;

    let gateway = cloud_tasks_gateway(config, dispatch)?;
    Ok(FanOutDispatcher::new(
        Arc::new(gateway),
        DispatchSettings::from(dispatch),
    ))
}

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays
/// pipeable.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixfan_core::TargetFormat;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::dispatch_from_lookup(|key| map.get(key).cloned()).unwrap()
    }

    #[test]
    fn parses_event_metadata() {
        let upload = parse_event(
            r#"{"name":"photo1","bucket":"uploads","metadata":{"name":"out1","formats":"jpeg, webp"}}"#,
        )
        .unwrap();
        assert_eq!(upload.source_key(), "photo1");
        assert_eq!(upload.output_name(), "out1");
        assert_eq!(upload.formats(), &[TargetFormat::Jpeg, TargetFormat::Webp]);
    }

    #[test]
    fn rejects_event_without_formats() {
        let err = parse_event(r#"{"name":"photo1","metadata":{"name":"out1"}}"#).unwrap_err();
        assert!(format!("{err:#}").contains("formats"));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse_event("{not json").is_err());
    }

    #[test]
    fn local_backend_is_refused() {
        let config = config(&[
            ("TASK_QUEUE_BACKEND", "local"),
            ("RUN_URL", "http://localhost:3000"),
        ]);
        assert!(dispatcher_from_config(&config).is_err());
    }

    #[test]
    fn dispatch_requires_run_url() {
        let config = config(&[]);
        let err = dispatcher_from_config(&config).err().unwrap();
        assert!(err.to_string().contains("RUN_URL"));
    }

    #[test]
    fn builds_cloud_tasks_dispatcher() {
        // Default gcs backend, no bucket names.
        let config = config(&[
            ("RUN_URL", "https://convert.example"),
            ("GCLOUD_PROJECT", "demo"),
            ("SERVICE_ACCOUNT", "tasks@demo.iam.gserviceaccount.com"),
            ("CLOUD_TASKS_ACCESS_TOKEN", "test-token"),
        ]);
        let dispatcher = dispatcher_from_config(&config).unwrap();
        assert_eq!(
            dispatcher.settings().target_url(),
            "https://convert.example/convert"
        );
    }
}
