//! Google Cloud Tasks over REST (v2)
//!
//! Tasks are created with `POST {endpoint}/v2/{queue}/tasks`. The bearer token
//! comes from a [`TokenSource`]: a fixed token (local emulators, CI) or the
//! GCE metadata server when running on Cloud Run.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::gateway::{EnqueueError, EnqueueResult, HttpTask, QueuePath, TaskHandle, TaskQueueGateway};

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh tokens this long before the server-side expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Supplies OAuth2 access tokens for the Cloud Tasks API.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> EnqueueResult<String>;
}

/// Always returns the same token
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> EnqueueResult<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Token of the instance's default service account, read from the metadata
/// server and cached until shortly before it expires.
pub struct MetadataServerToken {
    http_client: reqwest::Client,
    url: String,
    cache: RwLock<Option<CachedToken>>,
}

impl MetadataServerToken {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::with_url(http_client, METADATA_TOKEN_URL)
    }

    pub fn with_url(http_client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
            cache: RwLock::new(None),
        }
    }

    async fn fetch(&self) -> EnqueueResult<CachedToken> {
        let response = self
            .http_client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| {
                EnqueueError::Authentication(format!("Metadata server unreachable: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(EnqueueError::Authentication(format!(
                "Metadata server returned {}",
                response.status()
            )));
        }

        let body: MetadataTokenResponse = response.json().await.map_err(|e| {
            EnqueueError::Authentication(format!("Invalid metadata token response: {}", e))
        })?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        Ok(CachedToken {
            token: body.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}

#[async_trait]
impl TokenSource for MetadataServerToken {
    async fn access_token(&self) -> EnqueueResult<String> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(cached) = cache.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.fetch().await?;
        tracing::debug!("Refreshed Cloud Tasks access token from metadata server");
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskRequest<'a> {
    task: TaskBody<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskBody<'a> {
    name: &'a str,
    http_request: HttpRequestBody<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HttpRequestBody<'a> {
    url: &'a str,
    http_method: &'static str,
    headers: BTreeMap<&'a str, &'a str>,
    body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    oidc_token: Option<OidcTokenBody<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OidcTokenBody<'a> {
    service_account_email: &'a str,
    audience: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedTask {
    name: Option<String>,
}

fn request_body(task: &HttpTask) -> CreateTaskRequest<'_> {
    CreateTaskRequest {
        task: TaskBody {
            name: &task.name,
            http_request: HttpRequestBody {
                url: &task.url,
                http_method: "POST",
                headers: task
                    .headers
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect(),
                body: STANDARD.encode(&task.body),
                oidc_token: task.oidc.as_ref().map(|oidc| OidcTokenBody {
                    service_account_email: &oidc.service_account_email,
                    audience: &oidc.audience,
                }),
            },
        },
    }
}

/// Cloud Tasks gateway for one queue.
pub struct CloudTasksGateway {
    http_client: reqwest::Client,
    endpoint: String,
    queue: QueuePath,
    tokens: Arc<dyn TokenSource>,
}

impl CloudTasksGateway {
    pub fn new(
        endpoint: impl Into<String>,
        queue: QueuePath,
        tokens: Arc<dyn TokenSource>,
    ) -> EnqueueResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                EnqueueError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self::with_client(http_client, endpoint, queue, tokens))
    }

    pub fn with_client(
        http_client: reqwest::Client,
        endpoint: impl Into<String>,
        queue: QueuePath,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            queue,
            tokens,
        }
    }

    pub fn queue(&self) -> &QueuePath {
        &self.queue
    }

    fn create_url(&self) -> String {
        format!("{}/v2/{}/tasks", self.endpoint, self.queue.parent())
    }
}

#[async_trait]
impl TaskQueueGateway for CloudTasksGateway {
    #[tracing::instrument(skip(self, task), fields(task.name = %task.name, queue = %self.queue))]
    async fn create_task(&self, task: HttpTask) -> EnqueueResult<TaskHandle> {
        let start = Instant::now();
        let token = self.tokens.access_token().await?;

        let response = self
            .http_client
            .post(self.create_url())
            .bearer_auth(token)
            .json(&request_body(&task))
            .send()
            .await
            .map_err(|e| EnqueueError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::CONFLICT {
            return Err(EnqueueError::AlreadyExists(task.name));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let message = response.text().await.unwrap_or_default();
            return Err(EnqueueError::Authentication(format!("{}: {}", status, message)));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EnqueueError::QueueApi {
                status: status.as_u16(),
                message,
            });
        }

        let created: CreatedTask = response
            .json()
            .await
            .unwrap_or(CreatedTask { name: None });

        tracing::info!(
            url = %task.url,
            body_bytes = task.body.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Cloud Tasks task created"
        );

        Ok(TaskHandle {
            name: created.name.unwrap_or(task.name),
        })
    }

    fn backend_name(&self) -> &'static str {
        "cloud-tasks"
    }
}
