use std::fmt;

use chrono::Duration;
use kaveri_client_core::api::ApiError;
use kaveri_client_core::models::{AddCreditsRequest, AgentRecord};

use crate::AppContext;
use crate::notify::{Notifications, TimedIndicator, ToastLifetime};

pub const NAME_REQUIRED: &str = "Name is required";
pub const AMOUNT_REQUIRED: &str = "Valid amount is required";
pub const RECHARGE_FAILED: &str = "Recharge failed. Please try again.";
const SUCCESS_INDICATOR_SECONDS: i64 = 3;

/// Field errors from the last validation. Both can be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RechargeValidation {
    pub name: Option<&'static str>,
    pub amount: Option<&'static str>,
}

impl fmt::Display for RechargeValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.name.iter().chain(self.amount.iter()).copied().collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for RechargeValidation {}

impl RechargeValidation {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.amount.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RechargeOutcome {
    /// Credits added; the form was reset and the users list should refresh.
    Completed { kaveri_id: String, amount: f64 },
    Invalid(RechargeValidation),
    Failed(ApiError),
}

/// Recharge Credit form over the verified agents.
#[derive(Debug, Default)]
pub struct RechargeForm {
    candidates: Vec<AgentRecord>,
    selected: Option<String>,
    amount: String,
    errors: RechargeValidation,
    success: TimedIndicator,
    submitting: bool,
}

impl RechargeForm {
    pub fn set_candidates(&mut self, verified: Vec<AgentRecord>) {
        self.candidates = verified;
        if let Some(selected) = &self.selected {
            if !self
                .candidates
                .iter()
                .any(|agent| &agent.kaveri_id == selected)
            {
                self.selected = None;
            }
        }
    }

    #[must_use]
    pub fn candidates(&self) -> &[AgentRecord] {
        &self.candidates
    }

    /// Selects a candidate by Kaveri ID. Returns false if no candidate matches.
    pub fn select(&mut self, kaveri_id: &str) -> bool {
        let found = self
            .candidates
            .iter()
            .any(|agent| agent.kaveri_id == kaveri_id);
        if found {
            self.selected = Some(kaveri_id.to_string());
            self.errors.name = None;
        }
        found
    }

    #[must_use]
    pub fn selected(&self) -> Option<&AgentRecord> {
        let selected = self.selected.as_deref()?;
        self.candidates
            .iter()
            .find(|agent| agent.kaveri_id == selected)
    }

    pub fn set_amount(&mut self, raw: impl Into<String>) {
        self.amount = raw.into();
    }

    #[must_use]
    pub fn amount(&self) -> &str {
        &self.amount
    }

    #[must_use]
    pub fn errors(&self) -> &RechargeValidation {
        &self.errors
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    #[must_use]
    pub fn success_visible(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.success.is_visible(now)
    }

    pub fn validate(&mut self) -> Result<AddCreditsRequest, RechargeValidation> {
        let mut errors = RechargeValidation::default();
        let kaveri_id = self.selected().map(|agent| agent.kaveri_id.clone());
        if kaveri_id.is_none() {
            errors.name = Some(NAME_REQUIRED);
        }
        let amount = parse_amount(&self.amount);
        if amount.is_none() {
            errors.amount = Some(AMOUNT_REQUIRED);
        }
        self.errors = errors.clone();
        match (kaveri_id, amount) {
            (Some(kaveri_id), Some(amount)) => Ok(AddCreditsRequest { kaveri_id, amount }),
            _ => Err(errors),
        }
    }

    pub async fn submit(
        &mut self,
        ctx: &AppContext,
        notifications: &mut Notifications,
    ) -> RechargeOutcome {
        let request = match self.validate() {
            Ok(request) => request,
            Err(errors) => return RechargeOutcome::Invalid(errors),
        };

        self.submitting = true;
        let result = ctx.api().add_credits(&request).await;
        self.submitting = false;

        match result {
            Ok(_) => {
                tracing::info!(kaveri_id = %request.kaveri_id, amount = request.amount, "credits added");
                self.selected = None;
                self.amount.clear();
                self.success
                    .show(ctx.now(), Duration::seconds(SUCCESS_INDICATOR_SECONDS));
                RechargeOutcome::Completed {
                    kaveri_id: request.kaveri_id,
                    amount: request.amount,
                }
            }
            Err(error) => {
                tracing::warn!(kaveri_id = %request.kaveri_id, reason = %error, "recharge failed");
                notifications.error(RECHARGE_FAILED, ToastLifetime::Standard, ctx.now());
                RechargeOutcome::Failed(error)
            }
        }
    }
}

/// A finite amount greater than zero.
fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite() && *amount > 0.0)
}
