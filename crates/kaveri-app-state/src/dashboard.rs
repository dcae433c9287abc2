//! Dashboard: aggregate statistics plus the embedded agent list and
//! recharge form.

use std::fmt;

use kaveri_client_core::api::ApiError;
use kaveri_client_core::models::{AgentRecord, LetterRecord};

use crate::agent_list::AgentListScreen;
use crate::mutation::MutationOutcome;
use crate::notify::Notifications;
use crate::recharge::{RechargeForm, RechargeOutcome};
use crate::route::{self, Admission, AppRoute};
use crate::{AppContext, ScreenError};

/// Rupees counted per generated letter.
pub const AMOUNT_PER_LETTER: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    LettersGenerated,
    PendingUsers,
    TotalUsers,
    AmountReceived,
}

impl StatKind {
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::LettersGenerated => "Letters Generated",
            Self::PendingUsers => "Pending Users",
            Self::TotalUsers => "Total Users",
            Self::AmountReceived => "Amount Received",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendColor {
    Green,
    Yellow,
    Red,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trend {
    pub direction: TrendDirection,
    pub color: TrendColor,
    pub label: String,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.direction {
            TrendDirection::Up => '▲',
            TrendDirection::Down => '▼',
        };
        write!(f, "{arrow} {}", self.label)
    }
}

/// Trend indicator for one stat card.
#[must_use]
pub fn trend(kind: StatKind, current: u64, previous: u64) -> Trend {
    if kind == StatKind::PendingUsers {
        return match current {
            0 => Trend {
                direction: TrendDirection::Up,
                color: TrendColor::Green,
                label: "0".to_string(),
            },
            1..=3 => Trend {
                direction: TrendDirection::Down,
                color: TrendColor::Yellow,
                label: current.to_string(),
            },
            _ => Trend {
                direction: TrendDirection::Down,
                color: TrendColor::Red,
                label: current.to_string(),
            },
        };
    }

    if previous == 0 {
        return Trend {
            direction: TrendDirection::Up,
            color: TrendColor::Green,
            label: "100%".to_string(),
        };
    }

    let diff = current as f64 - previous as f64;
    let percent = diff / previous as f64 * 100.0;
    let (direction, color) = if diff >= 0.0 {
        (TrendDirection::Up, TrendColor::Green)
    } else {
        (TrendDirection::Down, TrendColor::Red)
    };
    Trend {
        direction,
        color,
        label: format!("{percent:.1}%"),
    }
}

/// Current and previous value of one stat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    pub current: u64,
    pub previous: u64,
}

impl Stat {
    fn update(&mut self, next: u64) {
        self.previous = self.current;
        self.current = next;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub letters_generated: Stat,
    pub pending_users: Stat,
    /// Verified agents.
    pub total_users: Stat,
    pub amount_received: Stat,
    pub unauthorized_amount: u64,
}

impl DashboardStats {
    #[must_use]
    pub fn stat(&self, kind: StatKind) -> Stat {
        match kind {
            StatKind::LettersGenerated => self.letters_generated,
            StatKind::PendingUsers => self.pending_users,
            StatKind::TotalUsers => self.total_users,
            StatKind::AmountReceived => self.amount_received,
        }
    }

    #[must_use]
    pub fn trend(&self, kind: StatKind) -> Trend {
        let stat = self.stat(kind);
        trend(kind, stat.current, stat.previous)
    }

    #[must_use]
    pub fn authorized_amount(&self) -> u64 {
        self.amount_received
            .current
            .saturating_sub(self.unauthorized_amount)
    }
}

/// Rupee amount with comma thousands separators.
#[must_use]
pub fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("₹{grouped}")
}

#[derive(Debug, Default)]
pub struct DashboardScreen {
    stats: DashboardStats,
    agent_list: AgentListScreen,
    recharge: RechargeForm,
    notifications: Notifications,
}

impl DashboardScreen {
    #[must_use]
    pub fn stats(&self) -> &DashboardStats {
        &self.stats
    }

    #[must_use]
    pub fn agent_list(&self) -> &AgentListScreen {
        &self.agent_list
    }

    #[must_use]
    pub fn recharge(&self) -> &RechargeForm {
        &self.recharge
    }

    pub fn recharge_mut(&mut self) -> &mut RechargeForm {
        &mut self.recharge
    }

    pub fn notifications_mut(&mut self) -> &mut Notifications {
        &mut self.notifications
    }

    /// Route entry: gate, then load every panel.
    pub async fn enter(&mut self, ctx: &AppContext) -> Result<(), ScreenError> {
        if let Admission::RedirectToLogin { reason } =
            route::admit(AppRoute::Dashboard, ctx.session(), ctx.now())
        {
            return Err(ScreenError::SessionRequired(reason));
        }
        let (letters, users) = tokio::join!(ctx.api().all_letters(), ctx.api().list_agents());
        self.apply_letters(letters)?;
        self.apply_users(users)?;
        self.agent_list.refresh(ctx).await
    }

    pub async fn refresh_users(&mut self, ctx: &AppContext) -> Result<(), ScreenError> {
        let users = ctx.api().list_agents().await;
        self.apply_users(users)
    }

    pub async fn refresh_letters(&mut self, ctx: &AppContext) -> Result<(), ScreenError> {
        let letters = ctx.api().all_letters().await;
        self.apply_letters(letters)
    }

    pub async fn toggle_show_suspended(&mut self, ctx: &AppContext) -> Result<(), ScreenError> {
        self.agent_list.toggle_show_suspended(ctx).await
    }

    /// Verify or block from the embedded list; a confirmed change refreshes
    /// the user stats.
    pub async fn set_verification(
        &mut self,
        ctx: &AppContext,
        kaveri_id: &str,
        verified: bool,
    ) -> Option<MutationOutcome<bool>> {
        let outcome = self
            .agent_list
            .set_verification(ctx, kaveri_id, verified, &mut self.notifications)
            .await?;
        if outcome.is_committed() {
            if let Err(error) = self.refresh_users(ctx).await {
                tracing::warn!(reason = %error, "failed to refresh users after verification change");
            }
        }
        Some(outcome)
    }

    /// Submits the recharge form; a completed recharge refreshes the users.
    pub async fn submit_recharge(&mut self, ctx: &AppContext) -> RechargeOutcome {
        let outcome = self.recharge.submit(ctx, &mut self.notifications).await;
        if matches!(outcome, RechargeOutcome::Completed { .. }) {
            if let Err(error) = self.refresh_users(ctx).await {
                tracing::warn!(reason = %error, "failed to refresh users after recharge");
            }
        }
        outcome
    }

    /// Clears the session. The caller shows the returned route.
    pub fn logout(&self, ctx: &AppContext) -> AppRoute {
        ctx.session().sign_out();
        AppRoute::Login
    }

    fn apply_users(
        &mut self,
        users: Result<Vec<AgentRecord>, ApiError>,
    ) -> Result<(), ScreenError> {
        let users = match users {
            Ok(users) => users,
            Err(error) => return degrade("users", error),
        };
        let (verified, pending): (Vec<AgentRecord>, Vec<AgentRecord>) = users
            .into_iter()
            .partition(|user| user.verification_status);
        self.stats.total_users.update(verified.len() as u64);
        self.stats.pending_users.update(pending.len() as u64);
        self.recharge.set_candidates(verified);
        Ok(())
    }

    fn apply_letters(
        &mut self,
        letters: Result<Vec<LetterRecord>, ApiError>,
    ) -> Result<(), ScreenError> {
        let letters = match letters {
            Ok(letters) => letters,
            Err(error) => return degrade("letters", error),
        };
        let total = letters.len() as u64;
        let unauthorized = letters.iter().filter(|letter| !letter.authorized).count() as u64;
        self.stats.letters_generated.update(total);
        self.stats.amount_received.update(total * AMOUNT_PER_LETTER);
        self.stats.unauthorized_amount = unauthorized * AMOUNT_PER_LETTER;
        Ok(())
    }
}

/// Read failures keep the previous values; only a rejected session surfaces.
fn degrade(what: &str, error: ApiError) -> Result<(), ScreenError> {
    tracing::warn!(what, reason = %error, "dashboard fetch failed; keeping previous values");
    if error.is_unauthenticated() {
        Err(error.into())
    } else {
        Ok(())
    }
}
