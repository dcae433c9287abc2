//! Wire models mirrored from the backend. The console never computes these
//! fields; it only holds copies and predicts one boolean at a time while a
//! mutation is in flight.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentRole {
    #[default]
    Agent,
    Admin,
    /// Preserved verbatim so unknown roles survive a round trip.
    Other(String),
}

impl AgentRole {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Agent => "agent",
            Self::Admin => "admin",
            Self::Other(value) => value.as_str(),
        }
    }

    /// Role the promote/demote action moves to from this one.
    #[must_use]
    pub fn toggled(&self) -> Self {
        match self {
            Self::Agent => Self::Admin,
            Self::Admin | Self::Other(_) => Self::Agent,
        }
    }
}

impl From<String> for AgentRole {
    fn from(value: String) -> Self {
        match value.as_str() {
            "agent" => Self::Agent,
            "admin" => Self::Admin,
            _ => Self::Other(value),
        }
    }
}

impl From<AgentRole> for String {
    fn from(value: AgentRole) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub kaveri_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "phone")]
    pub contact: Option<String>,
    #[serde(default)]
    pub consultancy_name: Option<String>,
    #[serde(default)]
    pub role: AgentRole,
    #[serde(default)]
    pub verification_status: bool,
    #[serde(default)]
    pub is_suspended: bool,
    #[serde(default, deserialize_with = "lenient_number")]
    pub credits: Option<f64>,
}

impl AgentRecord {
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("Unnamed")
    }

    #[must_use]
    pub fn status_label(&self) -> &'static str {
        match (self.verification_status, self.is_suspended) {
            (false, _) => "Blocked",
            (true, true) => "Suspended",
            (true, false) => "Verified",
        }
    }
}

/// `GET /users/:kaveriId`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    pub user: AgentRecord,
    #[serde(default, deserialize_with = "lenient_number")]
    pub credits: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub available_credits: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditLogEntry {
    pub amount: f64,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub father_name: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub authorized: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial body of `PUT /users/verify/:kaveriId`. Exactly one field is set
/// per request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<AgentRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_suspended: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<bool>,
}

impl AgentUpdate {
    #[must_use]
    pub fn role(role: AgentRole) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn suspension(is_suspended: bool) -> Self {
        Self {
            is_suspended: Some(is_suspended),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn verification(verification_status: bool) -> Self {
        Self {
            verification_status: Some(verification_status),
            ..Self::default()
        }
    }
}

/// `POST /users/credits/add-total`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCreditsRequest {
    pub kaveri_id: String,
    pub amount: f64,
}

/// `PATCH /users/:letterId/authorize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthorizeLetterRequest {
    pub authorized: bool,
}

/// List endpoints answer either with a bare array or with the array wrapped
/// under `key`. Any other shape is an empty list.
pub fn decode_list<T>(payload: serde_json::Value, key: &str) -> Result<Vec<T>, serde_json::Error>
where
    T: for<'de> Deserialize<'de>,
{
    match payload {
        serde_json::Value::Array(_) => serde_json::from_value(payload),
        serde_json::Value::Object(mut object) => match object.remove(key) {
            Some(list @ serde_json::Value::Array(_)) => serde_json::from_value(list),
            _ => Ok(Vec::new()),
        },
        _ => Ok(Vec::new()),
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(number)) => number.as_f64(),
        Some(serde_json::Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    })
}
