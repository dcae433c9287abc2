use kaveri_client_core::models::{AgentRecord, AgentUpdate};

use crate::mutation::{
    MutationController, MutationField, MutationKey, MutationLabels, MutationOutcome,
};
use crate::notify::{Notifications, ToastLifetime};
use crate::{AppContext, ScreenError};

/// Agent Management: the filtered agent list with verify/block controls.
#[derive(Debug, Default)]
pub struct AgentListScreen {
    show_suspended: bool,
    agents: Vec<AgentRecord>,
    loading: bool,
    mutations: MutationController,
}

impl AgentListScreen {
    #[must_use]
    pub fn new(show_suspended: bool) -> Self {
        Self {
            show_suspended,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn agents(&self) -> &[AgentRecord] {
        &self.agents
    }

    #[must_use]
    pub fn show_suspended(&self) -> bool {
        self.show_suspended
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn is_verification_pending(&self, kaveri_id: &str) -> bool {
        self.mutations
            .is_pending(&MutationKey::new(kaveri_id, MutationField::Verification))
    }

    /// Refetches the list. Failures leave an empty list; only an
    /// authentication failure is returned to the caller.
    pub async fn refresh(&mut self, ctx: &AppContext) -> Result<(), ScreenError> {
        self.loading = true;
        let result = ctx.api().list_agents().await;
        self.loading = false;
        match result {
            Ok(agents) => {
                let show_suspended = self.show_suspended;
                self.agents = agents
                    .into_iter()
                    .filter(|agent| agent.is_suspended == show_suspended)
                    .collect();
                Ok(())
            }
            Err(error) => {
                tracing::warn!(reason = %error, "failed to fetch agents");
                self.agents.clear();
                if error.is_unauthenticated() {
                    Err(error.into())
                } else {
                    Ok(())
                }
            }
        }
    }

    pub async fn set_show_suspended(
        &mut self,
        ctx: &AppContext,
        show_suspended: bool,
    ) -> Result<(), ScreenError> {
        self.show_suspended = show_suspended;
        self.refresh(ctx).await
    }

    pub async fn toggle_show_suspended(&mut self, ctx: &AppContext) -> Result<(), ScreenError> {
        self.set_show_suspended(ctx, !self.show_suspended).await
    }

    /// Verify (`true`) or block (`false`) one listed agent.
    pub async fn set_verification(
        &mut self,
        ctx: &AppContext,
        kaveri_id: &str,
        verified: bool,
        notifications: &mut Notifications,
    ) -> Option<MutationOutcome<bool>> {
        let index = self
            .agents
            .iter()
            .position(|agent| agent.kaveri_id == kaveri_id)?;
        let current = self.agents[index].verification_status;
        let (verb, past) = if verified {
            ("verify", "verified")
        } else {
            ("block", "blocked")
        };
        let labels = MutationLabels {
            success: Some(format!("User successfully {past}!")),
            failure: format!("Failed to {verb} user. Please try again."),
            lifetime: ToastLifetime::Short,
        };

        let key = MutationKey::new(kaveri_id, MutationField::Verification);
        let pending = self.mutations.begin(key, current, verified, labels)?;
        self.mutations
            .stage(&pending, &mut self.agents[index].verification_status);

        let result = ctx
            .api()
            .update_agent(kaveri_id, &AgentUpdate::verification(verified))
            .await;
        let outcome = self
            .mutations
            .settle(pending, result, notifications, ctx.now());
        if let Some(agent) = self
            .agents
            .iter_mut()
            .find(|agent| agent.kaveri_id == kaveri_id)
        {
            agent.verification_status = *outcome.value();
        }
        Some(outcome)
    }
}
