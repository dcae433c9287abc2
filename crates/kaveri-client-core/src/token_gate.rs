//! Local, advisory validation of the session credential.
//!
//! The credential is a JWT issued by the backend. The gate decodes its claims
//! segment without verifying the signature (the console never holds the
//! signing key) and decides whether a route may render. The backend remains
//! the authority: a 401 from any call invalidates the session regardless of
//! what the gate said.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The only role admitted into the console.
pub const MANAGER_ROLE: &str = "manager";

pub const NOT_AUTHORIZED_MESSAGE: &str = "Access denied. You are not Authorized.";
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid token received.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenGateError {
    #[error("no credential is stored")]
    Missing,
    #[error("credential is malformed: {reason}")]
    Malformed { reason: String },
    #[error("credential carries no expiry")]
    MissingExpiry,
    #[error("credential expired at {expired_at_ms} ms since the epoch")]
    Expired { expired_at_ms: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialClaims {
    pub role: Option<String>,
    /// Expiry in milliseconds since the epoch. A fractional `exp` claim
    /// keeps its sub-second part.
    pub exp_ms: Option<i64>,
    pub id: Option<String>,
    pub kaveri_id: Option<String>,
    pub email: Option<String>,
}

impl CredentialClaims {
    #[must_use]
    pub fn is_manager(&self) -> bool {
        self.role.as_deref() == Some(MANAGER_ROLE)
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp_ms.and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    exp: Option<serde_json::Value>,
    #[serde(default, alias = "_id", alias = "userId")]
    id: Option<serde_json::Value>,
    #[serde(default, rename = "kaveriId")]
    kaveri_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

pub fn decode_claims(token: &str) -> Result<CredentialClaims, TokenGateError> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(TokenGateError::Missing);
    }

    let mut segments = trimmed.split('.');
    let (Some(_header), Some(claims_segment), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(malformed("expected three dot-separated segments"));
    };

    let claims_bytes = URL_SAFE_NO_PAD
        .decode(claims_segment.trim_end_matches('='))
        .map_err(|error| malformed(format!("claims segment is not base64url: {error}")))?;
    let raw: RawClaims = serde_json::from_slice(&claims_bytes)
        .map_err(|error| malformed(format!("claims segment is not a JSON object: {error}")))?;

    Ok(CredentialClaims {
        role: raw.role,
        exp_ms: raw.exp.as_ref().and_then(numeric_millis),
        id: raw.id.as_ref().and_then(string_or_number),
        kaveri_id: raw.kaveri_id,
        email: raw.email,
    })
}

/// Full gate decision. Expiry at or before `now` is rejected, and so is a
/// credential without an expiry.
pub fn check(
    credential: Option<&str>,
    now: DateTime<Utc>,
) -> Result<CredentialClaims, TokenGateError> {
    let credential = credential.ok_or(TokenGateError::Missing)?;
    let claims = decode_claims(credential)?;
    let exp_ms = claims.exp_ms.ok_or(TokenGateError::MissingExpiry)?;
    if now.timestamp_millis() >= exp_ms {
        return Err(TokenGateError::Expired {
            expired_at_ms: exp_ms,
        });
    }
    Ok(claims)
}

#[must_use]
pub fn is_valid(credential: Option<&str>, now: DateTime<Utc>) -> bool {
    check(credential, now).is_ok()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginRejection {
    #[error("Invalid token received.")]
    InvalidToken,
    #[error("Access denied. You are not Authorized.")]
    NotAuthorized { role: Option<String> },
}

/// A decoded, unexpired manager credential. This is the only value a session
/// can be established from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    token: String,
    claims: CredentialClaims,
}

impl LoginGrant {
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn claims(&self) -> &CredentialClaims {
        &self.claims
    }

    pub(crate) fn into_token(self) -> String {
        self.token
    }
}

pub fn admit_login(
    token: Option<&str>,
    now: DateTime<Utc>,
) -> Result<LoginGrant, LoginRejection> {
    let token = token
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(LoginRejection::InvalidToken)?;
    let claims = check(Some(token), now).map_err(|_| LoginRejection::InvalidToken)?;
    if !claims.is_manager() {
        return Err(LoginRejection::NotAuthorized {
            role: claims.role.clone(),
        });
    }
    Ok(LoginGrant {
        token: token.to_string(),
        claims,
    })
}

fn malformed(reason: impl Into<String>) -> TokenGateError {
    TokenGateError::Malformed {
        reason: reason.into(),
    }
}

/// `exp` seconds as milliseconds.
fn numeric_millis(value: &serde_json::Value) -> Option<i64> {
    if let Some(seconds) = value.as_i64() {
        return Some(seconds.saturating_mul(1_000));
    }
    value
        .as_f64()
        .filter(|seconds| seconds.is_finite())
        .map(|seconds| (seconds * 1_000.0) as i64)
}

fn string_or_number(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use quickcheck::{QuickCheck, TestResult};

    use super::*;
    use crate::testing::{mint_credential, token_with_role};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid time")
    }

    #[test]
    fn valid_manager_credential_passes() {
        let now = fixed_now();
        let token = token_with_role("manager", now + Duration::hours(1));
        let claims = check(Some(token.as_str()), now).expect("valid credential");
        assert!(claims.is_manager());
        assert!(is_valid(Some(token.as_str()), now));
    }

    #[test]
    fn absent_credential_is_invalid() {
        assert_eq!(check(None, fixed_now()), Err(TokenGateError::Missing));
        assert!(!is_valid(Some("   "), fixed_now()));
    }

    #[test]
    fn expiry_equal_to_now_is_invalid() {
        let now = fixed_now();
        let token = token_with_role("manager", now);
        assert_eq!(
            check(Some(token.as_str()), now),
            Err(TokenGateError::Expired {
                expired_at_ms: now.timestamp_millis()
            })
        );
    }

    #[test]
    fn missing_expiry_fails_closed() {
        let token = mint_credential(&serde_json::json!({ "role": "manager" }));
        assert_eq!(
            check(Some(token.as_str()), fixed_now()),
            Err(TokenGateError::MissingExpiry)
        );
    }

    #[test]
    fn corrupt_claims_are_malformed() {
        let result = check(Some("header.%%%%.signature"), fixed_now());
        assert!(matches!(result, Err(TokenGateError::Malformed { .. })));

        let not_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode(b"not json"));
        assert!(matches!(
            check(Some(not_json.as_str()), fixed_now()),
            Err(TokenGateError::Malformed { .. })
        ));
    }

    #[test]
    fn padded_segments_and_float_expiry_decode() {
        let claims = URL_SAFE_NO_PAD.encode(br#"{"role":"manager","exp":4102444800.5,"id":42}"#);
        let token = format!("e30.{claims}==.sig");
        let decoded = decode_claims(&token).expect("decodes");
        assert_eq!(decoded.exp_ms, Some(4_102_444_800_500));
        assert_eq!(decoded.id.as_deref(), Some("42"));
    }

    #[test]
    fn fractional_expiry_is_compared_to_the_millisecond() {
        let claims = URL_SAFE_NO_PAD.encode(br#"{"role":"manager","exp":100.5}"#);
        let token = format!("e30.{claims}.sig");
        let at = |millis: i64| DateTime::<Utc>::from_timestamp_millis(millis).expect("valid time");

        assert!(is_valid(Some(token.as_str()), at(100_200)));
        assert!(is_valid(Some(token.as_str()), at(100_499)));
        assert_eq!(
            check(Some(token.as_str()), at(100_500)),
            Err(TokenGateError::Expired {
                expired_at_ms: 100_500
            })
        );
    }

    #[test]
    fn login_admits_only_managers() {
        let now = fixed_now();
        let manager = token_with_role("manager", now + Duration::minutes(5));
        let grant = admit_login(Some(manager.as_str()), now).expect("manager admitted");
        assert_eq!(grant.token(), manager);

        let agent = token_with_role("agent", now + Duration::minutes(5));
        let rejection = admit_login(Some(agent.as_str()), now).expect_err("agent rejected");
        assert_eq!(
            rejection,
            LoginRejection::NotAuthorized {
                role: Some("agent".to_string())
            }
        );
        assert_eq!(rejection.to_string(), NOT_AUTHORIZED_MESSAGE);
    }

    #[test]
    fn login_without_token_is_invalid_token() {
        let rejection = admit_login(None, fixed_now()).expect_err("rejected");
        assert_eq!(rejection, LoginRejection::InvalidToken);
        assert_eq!(rejection.to_string(), INVALID_TOKEN_MESSAGE);
    }

    #[test]
    fn every_expired_credential_is_rejected() {
        fn property(seconds_ago: u32, role: String) -> bool {
            let now = fixed_now();
            let token = token_with_role(&role, now - Duration::seconds(i64::from(seconds_ago)));
            !is_valid(Some(token.as_str()), now)
        }
        QuickCheck::new()
            .tests(200)
            .quickcheck(property as fn(u32, String) -> bool);
    }

    #[test]
    fn every_unexpired_credential_is_accepted() {
        fn property(seconds_ahead: u32) -> bool {
            let now = fixed_now();
            let token = token_with_role(
                "manager",
                now + Duration::seconds(i64::from(seconds_ahead) + 1),
            );
            is_valid(Some(token.as_str()), now)
        }
        QuickCheck::new()
            .tests(200)
            .quickcheck(property as fn(u32) -> bool);
    }

    #[test]
    fn arbitrary_strings_never_panic_and_rarely_pass() {
        fn property(input: String) -> TestResult {
            if input.matches('.').count() == 2 {
                return TestResult::discard();
            }
            TestResult::from_bool(!is_valid(Some(input.as_str()), fixed_now()))
        }
        QuickCheck::new()
            .tests(300)
            .quickcheck(property as fn(String) -> TestResult);
    }
}
