use kaveri_client_core::api::{ApiError, GENERIC_FAILURE_MESSAGE};
use kaveri_client_core::auth::{AuthInputError, LoginRequest};
use kaveri_client_core::session::CredentialStoreError;
use kaveri_client_core::token_gate::{CredentialClaims, LoginRejection, admit_login};

use crate::AppContext;
use crate::route::AppRoute;

pub const LOGIN_FAILED_MESSAGE: &str = "Login failed";

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error(transparent)]
    Input(#[from] AuthInputError),
    #[error(transparent)]
    Rejected(#[from] LoginRejection),
    #[error("{message}")]
    Failed { message: String },
    #[error("failed to store credential: {0}")]
    Store(#[from] CredentialStoreError),
}

impl LoginError {
    fn from_api(error: &ApiError) -> Self {
        let message = match error {
            ApiError::Http { message, .. } | ApiError::Unauthenticated { message }
                if message != GENERIC_FAILURE_MESSAGE =>
            {
                message.clone()
            }
            _ => LOGIN_FAILED_MESSAGE.to_string(),
        };
        Self::Failed { message }
    }
}

#[derive(Debug, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    error: Option<String>,
    loading: bool,
}

impl LoginForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Message shown above the form, if the last attempt failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Exchanges the credentials for a token and establishes the session only
    /// for a manager. Returns the route to show next.
    pub async fn submit(&mut self, ctx: &AppContext) -> Result<AppRoute, LoginError> {
        self.error = None;
        self.loading = true;
        let result = self.attempt(ctx).await;
        self.loading = false;
        match result {
            Ok(claims) => {
                tracing::info!(email = ?claims.email, "manager signed in");
                self.password.clear();
                Ok(AppRoute::Dashboard)
            }
            Err(error) => {
                self.error = Some(error.to_string());
                Err(error)
            }
        }
    }

    async fn attempt(&self, ctx: &AppContext) -> Result<CredentialClaims, LoginError> {
        let request = LoginRequest::new(&self.email, &self.password)?;
        let response = ctx
            .api()
            .login(&request)
            .await
            .map_err(|error| LoginError::from_api(&error))?;
        let grant = admit_login(response.token.as_deref(), ctx.now())?;
        let claims = grant.claims().clone();
        ctx.session().establish(grant)?;
        Ok(claims)
    }
}
