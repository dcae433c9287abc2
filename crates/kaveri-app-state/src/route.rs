use std::fmt;

use chrono::{DateTime, Utc};
use kaveri_client_core::session::SessionContext;
use kaveri_client_core::token_gate::{CredentialClaims, TokenGateError};

const AGENT_DETAIL_PREFIX: &str = "/agent-details/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppRoute {
    Login,
    Dashboard,
    AgentDetail { kaveri_id: String },
}

impl AppRoute {
    /// Parses an application path. Unknown paths have no route.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim();
        match path {
            "/login" => Some(Self::Login),
            "/" | "" => Some(Self::Dashboard),
            _ => path
                .strip_prefix(AGENT_DETAIL_PREFIX)
                .map(|id| id.trim_end_matches('/'))
                .filter(|id| !id.is_empty() && !id.contains('/'))
                .map(|id| Self::AgentDetail {
                    kaveri_id: id.to_string(),
                }),
        }
    }

    #[must_use]
    pub fn to_path(&self) -> String {
        match self {
            Self::Login => "/login".to_string(),
            Self::Dashboard => "/".to_string(),
            Self::AgentDetail { kaveri_id } => format!("{AGENT_DETAIL_PREFIX}{kaveri_id}"),
        }
    }

    #[must_use]
    pub fn requires_session(&self) -> bool {
        !matches!(self, Self::Login)
    }
}

impl fmt::Display for AppRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}

/// Route admission result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Granted {
        route: AppRoute,
        claims: Option<CredentialClaims>,
    },
    /// The credential failed the gate and has been cleared.
    RedirectToLogin { reason: TokenGateError },
}

impl Admission {
    #[must_use]
    pub fn route(&self) -> AppRoute {
        match self {
            Self::Granted { route, .. } => route.clone(),
            Self::RedirectToLogin { .. } => AppRoute::Login,
        }
    }
}

/// Runs the token gate for routes that need a session.
#[must_use]
pub fn admit(route: AppRoute, session: &SessionContext, now: DateTime<Utc>) -> Admission {
    if !route.requires_session() {
        return Admission::Granted {
            route,
            claims: None,
        };
    }
    match session.admit(now) {
        Ok(claims) => Admission::Granted {
            route,
            claims: Some(claims),
        },
        Err(reason) => {
            tracing::info!(route = %route, reason = %reason, "route entry refused");
            Admission::RedirectToLogin { reason }
        }
    }
}
