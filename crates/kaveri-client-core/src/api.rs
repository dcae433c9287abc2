use async_trait::async_trait;

use crate::auth::{LoginRequest, LoginResponse};
use crate::models::{
    AddCreditsRequest, AgentProfile, AgentRecord, AgentUpdate, CreditLogEntry, LetterRecord,
};

/// Shown when the backend gives no `message` of its own.
pub const GENERIC_FAILURE_MESSAGE: &str = "Request failed";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The backend answered 401. The session has already been invalidated by
    /// the time a caller sees this.
    #[error("authentication rejected: {message}")]
    Unauthenticated { message: String },
    #[error("request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("transport failed: {message}")]
    Transport { message: String },
    #[error("response could not be decoded: {message}")]
    Decode { message: String },
    #[error("invalid request path: {path}")]
    InvalidPath { path: String },
}

impl ApiError {
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. })
    }

    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthenticated { .. } => Some(401),
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text suitable for a notification or an inline form error.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::Unauthenticated { message } | Self::Http { message, .. } => message,
            Self::Transport { .. } | Self::Decode { .. } | Self::InvalidPath { .. } => {
                GENERIC_FAILURE_MESSAGE
            }
        }
    }
}

/// Receives reachability observations from the transport. Connection
/// failures report offline; any HTTP response at all reports online.
pub trait ConnectivityReporter: Send + Sync {
    fn report_online(&self);
    fn report_offline(&self);
}

/// Every backend operation the console performs. Implementations attach the
/// session credential and invalidate the session on a 401; callers only ever
/// see the typed result.
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// `POST /users/login`. Never invalidates the session.
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError>;

    /// `GET /users/getall`.
    async fn list_agents(&self) -> Result<Vec<AgentRecord>, ApiError>;

    /// `GET /users/:kaveriId`.
    async fn agent_profile(&self, kaveri_id: &str) -> Result<AgentProfile, ApiError>;

    /// `GET /users/letters/:kaveriId`.
    async fn agent_letters(&self, kaveri_id: &str) -> Result<Vec<LetterRecord>, ApiError>;

    /// `GET /users/credit-logs/:kaveriId`.
    async fn agent_credit_logs(&self, kaveri_id: &str) -> Result<Vec<CreditLogEntry>, ApiError>;

    /// `GET /users/letters`.
    async fn all_letters(&self) -> Result<Vec<LetterRecord>, ApiError>;

    /// `PUT /users/verify/:kaveriId`.
    async fn update_agent(
        &self,
        kaveri_id: &str,
        update: &AgentUpdate,
    ) -> Result<serde_json::Value, ApiError>;

    /// `POST /users/credits/add-total`.
    async fn add_credits(&self, request: &AddCreditsRequest) -> Result<serde_json::Value, ApiError>;

    /// `PATCH /users/:letterId/authorize`.
    async fn authorize_letter(
        &self,
        letter_id: &str,
        authorized: bool,
    ) -> Result<serde_json::Value, ApiError>;
}
