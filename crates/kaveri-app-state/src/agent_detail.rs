use kaveri_client_core::models::{AgentProfile, AgentRole, AgentUpdate, CreditLogEntry};

use crate::letters::LettersPanel;
use crate::mutation::{
    MutationController, MutationField, MutationKey, MutationLabels, MutationOutcome,
};
use crate::notify::{Notifications, ToastLifetime};
use crate::route::{self, Admission, AppRoute};
use crate::{AppContext, ScreenError};

/// Role change captured when the dialog opens. Confirming sends this
/// snapshot's target even if the profile changed in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleChange {
    pub from: AgentRole,
    pub to: AgentRole,
}

impl RoleChange {
    fn from_current(current: &AgentRole) -> Self {
        Self {
            from: current.clone(),
            to: current.toggled(),
        }
    }

    #[must_use]
    pub fn verb(&self) -> &'static str {
        if self.to == AgentRole::Admin {
            "promote"
        } else {
            "demote"
        }
    }

    fn labels(&self) -> MutationLabels {
        let past = if self.to == AgentRole::Admin {
            "promoted"
        } else {
            "demoted"
        };
        MutationLabels {
            success: Some(format!("User successfully {past} to {}!", self.to)),
            failure: format!("Failed to {} user. Please try again.", self.verb()),
            lifetime: ToastLifetime::Short,
        }
    }
}

/// Suspend/restore captured when the dialog opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspensionChange {
    pub currently_suspended: bool,
}

impl SuspensionChange {
    #[must_use]
    pub fn target(self) -> bool {
        !self.currently_suspended
    }

    #[must_use]
    pub fn verb(self) -> &'static str {
        if self.currently_suspended {
            "restore"
        } else {
            "suspend"
        }
    }

    fn labels(self) -> MutationLabels {
        let past = if self.currently_suspended {
            "restored"
        } else {
            "suspended"
        };
        MutationLabels {
            success: Some(format!("User successfully {past}!")),
            failure: format!("Failed to {} user. Please try again.", self.verb()),
            lifetime: ToastLifetime::Short,
        }
    }
}

#[derive(Debug)]
pub struct AgentDetailScreen {
    kaveri_id: String,
    profile: Option<AgentProfile>,
    letters: LettersPanel,
    credit_logs: Vec<CreditLogEntry>,
    role_dialog: Option<RoleChange>,
    suspend_dialog: Option<SuspensionChange>,
    mutations: MutationController,
    notifications: Notifications,
}

impl AgentDetailScreen {
    pub fn new(kaveri_id: impl Into<String>) -> Self {
        Self {
            kaveri_id: kaveri_id.into(),
            profile: None,
            letters: LettersPanel::default(),
            credit_logs: Vec::new(),
            role_dialog: None,
            suspend_dialog: None,
            mutations: MutationController::default(),
            notifications: Notifications::default(),
        }
    }

    #[must_use]
    pub fn kaveri_id(&self) -> &str {
        &self.kaveri_id
    }

    #[must_use]
    pub fn profile(&self) -> Option<&AgentProfile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub fn letters(&self) -> &LettersPanel {
        &self.letters
    }

    /// Newest first.
    #[must_use]
    pub fn credit_logs(&self) -> &[CreditLogEntry] {
        &self.credit_logs
    }

    #[must_use]
    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut Notifications {
        &mut self.notifications
    }

    #[must_use]
    pub fn status_label(&self) -> Option<&'static str> {
        self.profile
            .as_ref()
            .map(|profile| profile.user.status_label())
    }

    /// Promote/demote is offered only for agents that are not suspended.
    #[must_use]
    pub fn can_change_role(&self) -> bool {
        self.profile
            .as_ref()
            .is_some_and(|profile| !profile.user.is_suspended)
    }

    #[must_use]
    pub fn role_dialog(&self) -> Option<&RoleChange> {
        self.role_dialog.as_ref()
    }

    #[must_use]
    pub fn suspend_dialog(&self) -> Option<SuspensionChange> {
        self.suspend_dialog
    }

    #[must_use]
    pub fn is_role_change_pending(&self) -> bool {
        self.mutations
            .is_pending(&MutationKey::new(&self.kaveri_id, MutationField::Role))
    }

    #[must_use]
    pub fn is_suspension_pending(&self) -> bool {
        self.mutations
            .is_pending(&MutationKey::new(&self.kaveri_id, MutationField::Suspension))
    }

    /// Route entry: gate, profile, then letters and credit logs together.
    pub async fn load(&mut self, ctx: &AppContext) -> Result<(), ScreenError> {
        let route = AppRoute::AgentDetail {
            kaveri_id: self.kaveri_id.clone(),
        };
        if let Admission::RedirectToLogin { reason } = route::admit(route, ctx.session(), ctx.now())
        {
            return Err(ScreenError::SessionRequired(reason));
        }

        let profile = match ctx.api().agent_profile(&self.kaveri_id).await {
            Ok(profile) => profile,
            Err(error) => {
                tracing::warn!(kaveri_id = %self.kaveri_id, reason = %error, "failed to fetch agent");
                return Err(error.into());
            }
        };
        self.profile = Some(profile);

        let (letters, logs) = tokio::join!(
            ctx.api().agent_letters(&self.kaveri_id),
            ctx.api().agent_credit_logs(&self.kaveri_id)
        );
        let letters = letters.unwrap_or_else(|error| {
            tracing::warn!(kaveri_id = %self.kaveri_id, reason = %error, "failed to fetch letters");
            Vec::new()
        });
        let mut logs = logs.unwrap_or_else(|error| {
            tracing::warn!(kaveri_id = %self.kaveri_id, reason = %error, "failed to fetch credit logs");
            Vec::new()
        });
        logs.sort_by(|a, b| b.added_at.cmp(&a.added_at));

        self.letters.replace(letters);
        self.credit_logs = logs;
        Ok(())
    }

    /// Opens the promote/demote dialog, snapshotting the current role.
    pub fn open_role_dialog(&mut self) -> Option<&RoleChange> {
        if !self.can_change_role() {
            return None;
        }
        let role = &self.profile.as_ref()?.user.role;
        self.role_dialog = Some(RoleChange::from_current(role));
        self.role_dialog.as_ref()
    }

    pub fn cancel_role_dialog(&mut self) {
        self.role_dialog = None;
    }

    /// Confirms the open role dialog. The target and verb come from the
    /// dialog snapshot; a rollback restores the role the profile held when
    /// the request was sent. The dialog closes on commit and stays open on
    /// rollback. A dialog left open over an agent that has since been
    /// suspended is closed without sending anything.
    pub async fn confirm_role_change(
        &mut self,
        ctx: &AppContext,
    ) -> Option<MutationOutcome<AgentRole>> {
        let change = self.role_dialog.clone()?;
        if !self.can_change_role() {
            tracing::info!(kaveri_id = %self.kaveri_id, "agent is suspended; role change dropped");
            self.role_dialog = None;
            return None;
        }
        let profile = self.profile.as_mut()?;
        let key = MutationKey::new(&self.kaveri_id, MutationField::Role);
        let current = profile.user.role.clone();
        let pending = self
            .mutations
            .begin(key, current, change.to.clone(), change.labels())?;
        self.mutations.stage(&pending, &mut profile.user.role);

        let result = ctx
            .api()
            .update_agent(&self.kaveri_id, &AgentUpdate::role(change.to.clone()))
            .await;
        let outcome = self
            .mutations
            .settle(pending, result, &mut self.notifications, ctx.now());
        if let Some(profile) = self.profile.as_mut() {
            profile.user.role = outcome.value().clone();
        }
        if outcome.is_committed() {
            self.role_dialog = None;
        }
        Some(outcome)
    }

    pub fn open_suspend_dialog(&mut self) -> Option<SuspensionChange> {
        let suspended = self.profile.as_ref()?.user.is_suspended;
        let change = SuspensionChange {
            currently_suspended: suspended,
        };
        self.suspend_dialog = Some(change);
        Some(change)
    }

    pub fn cancel_suspend_dialog(&mut self) {
        self.suspend_dialog = None;
    }

    /// Confirms the open suspend dialog, with the same snapshot rules as
    /// [`Self::confirm_role_change`].
    pub async fn confirm_suspension(&mut self, ctx: &AppContext) -> Option<MutationOutcome<bool>> {
        let change = self.suspend_dialog?;
        let profile = self.profile.as_mut()?;
        let key = MutationKey::new(&self.kaveri_id, MutationField::Suspension);
        let pending = self.mutations.begin(
            key,
            profile.user.is_suspended,
            change.target(),
            change.labels(),
        )?;
        self.mutations.stage(&pending, &mut profile.user.is_suspended);

        let result = ctx
            .api()
            .update_agent(&self.kaveri_id, &AgentUpdate::suspension(change.target()))
            .await;
        let outcome = self
            .mutations
            .settle(pending, result, &mut self.notifications, ctx.now());
        if let Some(profile) = self.profile.as_mut() {
            profile.user.is_suspended = *outcome.value();
        }
        if outcome.is_committed() {
            self.suspend_dialog = None;
        }
        Some(outcome)
    }

    pub async fn toggle_letter(
        &mut self,
        ctx: &AppContext,
        letter_id: &str,
    ) -> Option<MutationOutcome<bool>> {
        self.letters
            .toggle(ctx, letter_id, &mut self.notifications)
            .await
    }
}
