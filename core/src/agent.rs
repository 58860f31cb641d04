use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::AgentConfig;
use crate::error::{CatalogError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessagePart {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMessage {
    pub role: String,
    pub parts: Vec<MessagePart>,
}

/// Body of `POST /run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub new_message: NewMessage,
    pub streaming: bool,
}

impl RunRequest {
    pub fn user_query(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            new_message: NewMessage {
                role: "user".to_string(),
                parts: vec![MessagePart { text: query.into() }],
            },
            streaming: false,
        }
    }
}

/// The remote conversational search service.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    fn app_name(&self) -> &str;

    async fn create_session(&self, user_id: &str, session_id: &str) -> Result<()>;

    /// Sends one user message and returns the raw response payload.
    async fn run(&self, request: &RunRequest) -> Result<Value>;
}

pub struct HttpAgentBackend {
    client: reqwest::Client,
    base_url: String,
    app_name: String,
}

impl HttpAgentBackend {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        info!(base_url = %config.base_url, app = %config.app_name, "agent backend configured");
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_name: config.app_name.clone(),
        })
    }

    pub fn session_url(&self, user_id: &str, session_id: &str) -> String {
        format!(
            "{}/apps/{}/users/{}/sessions/{}",
            self.base_url, self.app_name, user_id, session_id
        )
    }

    pub fn run_url(&self) -> String {
        format!("{}/run", self.base_url)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CatalogError::Status { status: status.as_u16(), body })
    }
}

#[async_trait]
impl AgentBackend for HttpAgentBackend {
    fn app_name(&self) -> &str {
        &self.app_name
    }

    async fn create_session(&self, user_id: &str, session_id: &str) -> Result<()> {
        let url = self.session_url(user_id, session_id);
        debug!(%url, "creating agent session");

        let response = self.client.post(&url).json(&json!({})).send().await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn run(&self, request: &RunRequest) -> Result<Value> {
        let response = self.client.post(self.run_url()).json(request).send().await?;
        let response = Self::ensure_success(response).await?;

        let body = response.bytes().await?;
        debug!(bytes = body.len(), session = %request.session_id, "agent run completed");
        serde_json::from_slice(&body).map_err(CatalogError::Decode)
    }
}
