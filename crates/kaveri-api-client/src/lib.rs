use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kaveri_client_core::api::{AdminApi, ApiError, ConnectivityReporter, GENERIC_FAILURE_MESSAGE};
use kaveri_client_core::auth::{LoginRequest, LoginResponse, normalize_base_url};
use kaveri_client_core::config::{AdminConfig, DEFAULT_REQUEST_TIMEOUT_MS, MIN_REQUEST_TIMEOUT_MS};
use kaveri_client_core::models::{
    AddCreditsRequest, AgentProfile, AgentRecord, AgentUpdate, AuthorizeLetterRequest,
    CreditLogEntry, LetterRecord, decode_list,
};
use kaveri_client_core::session::SessionContext;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct KaveriApiClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl KaveriApiClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl From<&AdminConfig> for KaveriApiClientConfig {
    fn from(config: &AdminConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout_ms: config.request_timeout_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Credential {
    Attach,
    Omit,
}

/// The Remote Resource Client. Cloning is cheap; clones share the HTTP pool,
/// the session and the connectivity reporter.
#[derive(Clone)]
pub struct KaveriApiClient {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
    session: SessionContext,
    connectivity: Option<Arc<dyn ConnectivityReporter>>,
}

impl fmt::Debug for KaveriApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KaveriApiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("connectivity", &self.connectivity.is_some())
            .finish_non_exhaustive()
    }
}

impl KaveriApiClient {
    pub fn new(config: KaveriApiClientConfig, session: SessionContext) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(&config.base_url).map_err(|error| {
            ApiError::InvalidPath {
                path: format!("{}: {error}", config.base_url.trim()),
            }
        })?;
        Ok(Self {
            base_url,
            timeout: Duration::from_millis(config.timeout_ms.max(MIN_REQUEST_TIMEOUT_MS)),
            http: reqwest::Client::new(),
            session,
            connectivity: None,
        })
    }

    #[must_use]
    pub fn with_connectivity(mut self, reporter: Arc<dyn ConnectivityReporter>) -> Self {
        self.connectivity = Some(reporter);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> Option<String> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('/') {
            Some(format!("{}{}", self.base_url, trimmed))
        } else {
            Some(format!("{}/{}", self.base_url, trimmed))
        }
    }

    #[must_use]
    pub fn login_path() -> &'static str {
        "/users/login"
    }

    #[must_use]
    pub fn agents_path() -> &'static str {
        "/users/getall"
    }

    #[must_use]
    pub fn agent_path(kaveri_id: &str) -> String {
        format!("/users/{kaveri_id}")
    }

    #[must_use]
    pub fn agent_letters_path(kaveri_id: &str) -> String {
        format!("/users/letters/{kaveri_id}")
    }

    #[must_use]
    pub fn credit_logs_path(kaveri_id: &str) -> String {
        format!("/users/credit-logs/{kaveri_id}")
    }

    #[must_use]
    pub fn letters_path() -> &'static str {
        "/users/letters"
    }

    #[must_use]
    pub fn verify_path(kaveri_id: &str) -> String {
        format!("/users/verify/{kaveri_id}")
    }

    #[must_use]
    pub fn add_credits_path() -> &'static str {
        "/users/credits/add-total"
    }

    #[must_use]
    pub fn authorize_letter_path(letter_id: &str) -> String {
        format!("/users/{letter_id}/authorize")
    }

    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value, ApiError> {
        let bytes = self
            .send(Method::GET, path, None::<&()>, Credential::Attach)
            .await?;
        decode_json(&bytes)
    }

    pub async fn send_json<Req>(
        &self,
        method: Method,
        path: &str,
        payload: &Req,
    ) -> Result<serde_json::Value, ApiError>
    where
        Req: Serialize + ?Sized,
    {
        let bytes = self
            .send(method, path, Some(payload), Credential::Attach)
            .await?;
        decode_json(&bytes)
    }

    async fn get_list<T>(&self, path: &str, key: &str) -> Result<Vec<T>, ApiError>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let payload = self.get_json(path).await?;
        decode_list(payload, key).map_err(|error| ApiError::Decode {
            message: error.to_string(),
        })
    }

    async fn send<Req>(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Req>,
        credential: Credential,
    ) -> Result<Vec<u8>, ApiError>
    where
        Req: Serialize + ?Sized,
    {
        let url = self.endpoint(path).ok_or_else(|| ApiError::InvalidPath {
            path: path.to_string(),
        })?;
        let request_id = format!("req_{}", Uuid::new_v4().simple());

        let mut request = self
            .http
            .request(method.clone(), url.as_str())
            .header("x-request-id", request_id.as_str())
            .timeout(self.timeout);
        if credential == Credential::Attach {
            if let Some(token) = self.session.credential() {
                request = request.bearer_auth(token);
            }
        }
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        tracing::debug!(%method, path, request_id = %request_id, "sending backend request");
        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => {
                if error.is_connect() {
                    self.report_offline();
                }
                tracing::warn!(%method, path, request_id = %request_id, reason = %error, "backend request failed");
                return Err(ApiError::Transport {
                    message: error.to_string(),
                });
            }
        };
        self.report_online();

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|error| ApiError::Transport {
                message: error.to_string(),
            })?;

        if status == StatusCode::UNAUTHORIZED && credential == Credential::Attach {
            let message = backend_message(&bytes).unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
            self.session.invalidate(&message);
            return Err(ApiError::Unauthenticated { message });
        }
        if !status.is_success() {
            tracing::debug!(%method, path, status = status.as_u16(), "backend returned failure status");
            return Err(format_http_error(status, &bytes));
        }
        Ok(bytes.to_vec())
    }

    fn report_online(&self) {
        if let Some(reporter) = &self.connectivity {
            reporter.report_online();
        }
    }

    fn report_offline(&self) {
        if let Some(reporter) = &self.connectivity {
            reporter.report_offline();
        }
    }
}

#[async_trait]
impl AdminApi for KaveriApiClient {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        let bytes = self
            .send(Method::POST, Self::login_path(), Some(request), Credential::Omit)
            .await?;
        serde_json::from_slice(&bytes).map_err(|error| ApiError::Decode {
            message: error.to_string(),
        })
    }

    async fn list_agents(&self) -> Result<Vec<AgentRecord>, ApiError> {
        self.get_list(Self::agents_path(), "users").await
    }

    async fn agent_profile(&self, kaveri_id: &str) -> Result<AgentProfile, ApiError> {
        let path = Self::agent_path(path_segment(kaveri_id)?);
        let payload = self.get_json(&path).await?;
        serde_json::from_value(payload).map_err(|error| ApiError::Decode {
            message: error.to_string(),
        })
    }

    async fn agent_letters(&self, kaveri_id: &str) -> Result<Vec<LetterRecord>, ApiError> {
        let path = Self::agent_letters_path(path_segment(kaveri_id)?);
        self.get_list(&path, "letters").await
    }

    async fn agent_credit_logs(&self, kaveri_id: &str) -> Result<Vec<CreditLogEntry>, ApiError> {
        let path = Self::credit_logs_path(path_segment(kaveri_id)?);
        self.get_list(&path, "logs").await
    }

    async fn all_letters(&self) -> Result<Vec<LetterRecord>, ApiError> {
        self.get_list(Self::letters_path(), "letters").await
    }

    async fn update_agent(
        &self,
        kaveri_id: &str,
        update: &AgentUpdate,
    ) -> Result<serde_json::Value, ApiError> {
        let path = Self::verify_path(path_segment(kaveri_id)?);
        self.send_json(Method::PUT, &path, update).await
    }

    async fn add_credits(&self, request: &AddCreditsRequest) -> Result<serde_json::Value, ApiError> {
        self.send_json(Method::POST, Self::add_credits_path(), request)
            .await
    }

    async fn authorize_letter(
        &self,
        letter_id: &str,
        authorized: bool,
    ) -> Result<serde_json::Value, ApiError> {
        let path = Self::authorize_letter_path(path_segment(letter_id)?);
        self.send_json(Method::PATCH, &path, &AuthorizeLetterRequest { authorized })
            .await
    }
}

/// Failure status to [`ApiError::Http`], carrying the backend's own message
/// when the body has one.
pub fn format_http_error(status: StatusCode, body: &[u8]) -> ApiError {
    ApiError::Http {
        status: status.as_u16(),
        message: backend_message(body).unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
    }
}

/// Reads `message`, `error.message` or a string `error` from a JSON body.
#[must_use]
pub fn backend_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let candidate = value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .or_else(|| {
            value
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(serde_json::Value::as_str)
        })
        .or_else(|| value.get("error").and_then(serde_json::Value::as_str))?;
    non_empty_string(candidate)
}

fn decode_json(bytes: &[u8]) -> Result<serde_json::Value, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|error| ApiError::Decode {
        message: error.to_string(),
    })
}

fn path_segment(value: &str) -> Result<&str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.contains(['/', '?', '#']) {
        return Err(ApiError::InvalidPath {
            path: value.to_string(),
        });
    }
    Ok(trimmed)
}

fn non_empty_string(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
