//! Credential minting for tests. Tokens are HS256-signed the same way the
//! backend signs them; the console never verifies the signature, so the key
//! is fixed.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TEST_SIGNING_KEY: &[u8] = b"kaveri-admin-test-signing-key";

#[must_use]
pub fn mint_credential(claims: &serde_json::Value) -> String {
    let header = serde_json::json!({ "alg": "HS256", "typ": "JWT" });
    let header_segment = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims_segment = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signing_input = format!("{header_segment}.{claims_segment}");

    let signature_segment = match HmacSha256::new_from_slice(TEST_SIGNING_KEY) {
        Ok(mut mac) => {
            mac.update(signing_input.as_bytes());
            URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
        }
        Err(_) => String::from("unsigned"),
    };

    format!("{signing_input}.{signature_segment}")
}

#[must_use]
pub fn token_with_role(role: &str, expires_at: DateTime<Utc>) -> String {
    mint_credential(&serde_json::json!({
        "id": "mgr_1",
        "email": "manager@kaveri.example",
        "role": role,
        "iat": expires_at.timestamp() - 3_600,
        "exp": expires_at.timestamp(),
    }))
}

/// Manager credential valid for an hour from the wall clock.
#[must_use]
pub fn fresh_manager_token() -> String {
    token_with_role("manager", Utc::now() + chrono::Duration::hours(1))
}
