use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthInputError {
    #[error("base url must not be empty")]
    EmptyBaseUrl,
    #[error("base url must use http:// or https:// and include a host")]
    InvalidBaseUrl,
    #[error("email must not be empty")]
    EmptyEmail,
    #[error("password must not be empty")]
    EmptyPassword,
}

/// Body of `POST /users/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: &str, password: &str) -> Result<Self, AuthInputError> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(AuthInputError::EmptyPassword);
        }
        Ok(Self {
            email,
            password: password.to_string(),
        })
    }
}

/// Response of `POST /users/login`. Only the token is consumed; everything the
/// console needs about the manager is read from the token claims.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
}

pub fn normalize_base_url(raw: &str) -> Result<String, AuthInputError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthInputError::EmptyBaseUrl);
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(AuthInputError::InvalidBaseUrl);
    }
    let Some((_, remainder)) = trimmed.split_once("://") else {
        return Err(AuthInputError::InvalidBaseUrl);
    };
    if remainder.trim().is_empty() || remainder.starts_with('/') {
        return Err(AuthInputError::InvalidBaseUrl);
    }
    Ok(trimmed.to_string())
}

/// Trims surrounding whitespace. Case is kept as typed; the backend decides
/// how emails match.
pub fn normalize_email(raw: &str) -> Result<String, AuthInputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuthInputError::EmptyEmail);
    }
    Ok(trimmed.to_string())
}
