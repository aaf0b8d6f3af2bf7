//! Application API consumed by scenario setup

use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2eError, E2eResult};

pub const RESET_PATH: &str = "/api/testing/reset";
pub const USERS_PATH: &str = "/api/users";

/// A user created through the app before a scenario logs in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFixture {
    /// Display name, shown as "<name> logged-in"
    pub name: String,
    pub username: String,
    pub password: String,
}

impl UserFixture {
    pub fn new(name: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Banner text the app shows after a successful login
    pub fn logged_in_banner(&self) -> String {
        format!("{} logged-in", self.name)
    }
}

/// Server-side state control used by `before_each` hooks
#[async_trait]
pub trait Backend: Send + Sync {
    /// Wipe every user and note. Idempotent.
    async fn reset(&self) -> E2eResult<()>;

    /// Create a user; duplicate usernames are rejected by the app
    async fn create_user(&self, user: &UserFixture) -> E2eResult<()>;
}

/// [`Backend`] talking to the app over HTTP
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .no_proxy()
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: Option<&T>) -> E2eResult<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let mut request = self.client.post(&url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(E2eError::Api {
            endpoint: path.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn reset(&self) -> E2eResult<()> {
        self.post::<()>(RESET_PATH, None).await
    }

    async fn create_user(&self, user: &UserFixture) -> E2eResult<()> {
        self.post(USERS_PATH, Some(user)).await
    }
}
