//! Screen state for the Kaveri admin console.
//!
//! Screens are plain owned values driven by async methods that take
//! `&mut self` and an [`AppContext`]. Nothing here renders; a front end
//! reads the state back after each call.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kaveri_client_core::api::{AdminApi, ApiError};
use kaveri_client_core::session::SessionContext;
use kaveri_client_core::token_gate::TokenGateError;

pub mod agent_detail;
pub mod agent_list;
pub mod clock;
pub mod connectivity;
pub mod dashboard;
pub mod letters;
pub mod login;
pub mod mutation;
pub mod notify;
pub mod recharge;
pub mod route;
pub mod shell;

pub use clock::{Clock, SystemClock};

/// Shared handles every screen operation needs.
#[derive(Clone)]
pub struct AppContext {
    api: Arc<dyn AdminApi>,
    session: SessionContext,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    pub fn new(api: Arc<dyn AdminApi>, session: SessionContext) -> Self {
        Self {
            api,
            session,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn api(&self) -> &dyn AdminApi {
        self.api.as_ref()
    }

    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Why a screen could not be shown or refreshed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScreenError {
    #[error("sign in required: {0}")]
    SessionRequired(#[from] TokenGateError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ScreenError {
    /// True when the application root should route to login.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        match self {
            Self::SessionRequired(_) => true,
            Self::Api(error) => error.is_unauthenticated(),
        }
    }
}
