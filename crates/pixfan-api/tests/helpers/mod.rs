#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use bytes::Bytes;
use pixfan_api::setup::{build_state, routes::setup_routes};
use pixfan_api::AppState;
use pixfan_core::Config;
use pixfan_storage::{ObjectMetadata, ObjectStream, Storage, StorageBackend, StorageResult};
use pixfan_tasks::{
    DispatchSettings, EnqueueError, EnqueueResult, FanOutDispatcher, HttpTask, QueuePath,
    TaskHandle, TaskQueueGateway,
};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const RUN_URL: &str = "https://convert.example";

/// Task queue double: records every task, optionally failing one call.
#[derive(Default)]
pub struct RecordingGateway {
    pub tasks: Mutex<Vec<HttpTask>>,
    pub fail_at: Option<usize>,
}

impl RecordingGateway {
    pub fn bodies(&self) -> Vec<String> {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .map(|t| String::from_utf8(t.body.to_vec()).unwrap())
            .collect()
    }
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
                message: "queue unavailable".to_string(),
            });
        }
        Ok(TaskHandle { name })
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// Bucket wrapper that counts reads and writes going through it.
pub struct CountingStorage {
    inner: Arc<dyn Storage>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingStorage {
    fn new(inner: Arc<dyn Storage>) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for CountingStorage {
    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }

    async fn read(&self, key: &str) -> StorageResult<Bytes> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, data: Bytes, metadata: &ObjectMetadata) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(key, data, metadata).await
    }

    async fn read_stream(&self, key: &str) -> StorageResult<ObjectStream> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_stream(key).await
    }

    async fn check(&self) -> StorageResult<()> {
        self.inner.check().await
    }
}

/// Test application
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub gateway: Option<Arc<RecordingGateway>>,
    pub source: Arc<CountingStorage>,
    pub destination: Arc<CountingStorage>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Put an object into the source bucket.
    pub async fn put_source(&self, key: &str, data: Vec<u8>) {
        self.state
            .source
            .write(key, Bytes::from(data), &ObjectMetadata::with_content_type("image/png"))
            .await
            .unwrap();
    }

    /// Put an object into the destination bucket.
    pub async fn put_destination(&self, key: &str, data: Vec<u8>, content_type: &str) {
        let metadata = ObjectMetadata::with_content_type(content_type)
            .cache_control(Some("public, max-age=3600".to_string()));
        self.state
            .destination
            .write(key, Bytes::from(data), &metadata)
            .await
            .unwrap();
    }

    /// Read an output object directly, bypassing the counters.
    pub async fn destination_object(&self, key: &str) -> Option<Bytes> {
        self.destination.inner.read(key).await.ok()
    }

    /// Reads of the source bucket made by the application.
    pub fn source_reads(&self) -> usize {
        self.source.reads()
    }

    /// Writes to the destination bucket, including `put_destination`.
    pub fn destination_writes(&self) -> usize {
        self.destination.writes()
    }
}

#[derive(Default)]
pub struct TestAppBuilder {
    env: Vec<(&'static str, String)>,
    gateway: Option<Arc<RecordingGateway>>,
}

impl TestAppBuilder {
    pub fn env(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.env.push((key, value.into()));
        self
    }

    pub fn cdn(self, url: &str) -> Self {
        self.env("CDN_URL", url)
    }

    /// Enable fan-out dispatch through a recording gateway.
    pub fn dispatch(mut self, gateway: RecordingGateway) -> Self {
        self.gateway = Some(Arc::new(gateway));
        self
    }

    pub async fn build(self) -> TestApp {
        let mut env: HashMap<String, String> = HashMap::from([
            ("STORAGE_BACKEND".to_string(), "memory".to_string()),
            ("SRC_BUCKET_NAME".to_string(), "uploads".to_string()),
            ("DEST_BUCKET_NAME".to_string(), "derived".to_string()),
        ]);
        env.extend(self.env.into_iter().map(|(k, v)| (k.to_string(), v)));

        let config = Config::from_lookup(|key| env.get(key).cloned()).unwrap();
        let config = Arc::new(config);
        let base = build_state(config.clone()).await.unwrap();
        let source = Arc::new(CountingStorage::new(base.source.clone()));
        let destination = Arc::new(CountingStorage::new(base.destination.clone()));

        let mut state = AppState {
            source: source.clone(),
            destination: destination.clone(),
            ..(*base).clone()
        };

        if let Some(gateway) = &self.gateway {
            let settings = DispatchSettings {
                queue: QueuePath::new("demo", "us-central1", "image-conversions"),
                run_url: RUN_URL.to_string(),
                service_account: Some("tasks@demo.iam.gserviceaccount.com".to_string()),
            };
            let gateway: Arc<dyn TaskQueueGateway> = gateway.clone();
            state.dispatcher = Some(Arc::new(FanOutDispatcher::new(gateway, settings)));
        }
        let state = Arc::new(state);

        let server = TestServer::new(setup_routes(&config, state.clone())).unwrap();

        TestApp {
            server,
            state,
            gateway: self.gateway,
            source,
            destination,
        }
    }
}

pub async fn setup_test_app() -> TestApp {
    TestAppBuilder::default().build().await
}

/// Encode a gradient PNG of the given size.
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub fn dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}
