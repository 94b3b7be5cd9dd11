//! OmniDimension API Client

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Failed to connect to OmniDimension API")]
    Request(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Failed to read OmniDimension API response")]
    Decode(#[source] reqwest::Error),
}

// ============================================
// API Request Types
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallContext {
    pub call_script: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchCallRequest {
    pub agent_id: i64,
    pub to_number: String,
    pub from_number_id: i64,
    pub call_context: CallContext,
}

#[derive(Debug, Serialize)]
struct PageQuery {
    pageno: u32,
    pagesize: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            pageno: 1,
            pagesize: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Operations the bridge needs from the call-management service.
///
/// Responses come back as untyped JSON; shape handling lives in
/// [`crate::extract`].
#[async_trait]
pub trait CallApi: Send + Sync {
    /// Start an outbound call
    async fn dispatch_call(&self, request: &DispatchCallRequest) -> Result<Value, ApiError>;

    /// First page of call logs
    async fn call_logs(&self) -> Result<Value, ApiError>;

    /// Full detail for one call log
    async fn call_log(&self, call_id: &str) -> Result<Value, ApiError>;

    /// First page of imported phone numbers
    async fn phone_numbers(&self) -> Result<Value, ApiError>;
}

/// API Client for OmniDimension
pub struct OmnidimClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OmnidimClient {
    /// Create a new API client
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send an authorized request and read the body as JSON.
    ///
    /// A body that is not JSON is returned as a JSON string, an empty one as null.
    async fn send(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let resp = request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await.map_err(ApiError::Decode)?;

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

#[async_trait]
impl CallApi for OmnidimClient {
    async fn dispatch_call(&self, request: &DispatchCallRequest) -> Result<Value, ApiError> {
        let url = self.url("calls/dispatch");
        debug!(%url, agent_id = request.agent_id, "Dispatching call");

        self.send(self.client.post(&url).json(request)).await
    }

    async fn call_logs(&self) -> Result<Value, ApiError> {
        let url = self.url("calls/logs");
        debug!(%url, "Listing call logs");

        self.send(self.client.get(&url).query(&PageQuery::default()))
            .await
    }

    async fn call_log(&self, call_id: &str) -> Result<Value, ApiError> {
        let url = self.url(&format!("calls/logs/{}", call_id));
        debug!(%url, "Fetching call log detail");

        self.send(self.client.get(&url)).await
    }

    async fn phone_numbers(&self) -> Result<Value, ApiError> {
        let url = self.url("phone_number/list");
        debug!(%url, "Listing phone numbers");

        self.send(self.client.get(&url).query(&PageQuery::default()))
            .await
    }
}
