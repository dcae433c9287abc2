//! Optimistic Mutation Controller.
//!
//! A mutation targets one boolean-ish field of one entity. While it is in
//! flight its key is Pending and a second `begin` on the same key is a no-op,
//! which is what keeps the triggering control disabled. Settling always
//! returns the key to Idle and produces the value the local copy must hold
//! from then on: the target on success, the snapshot taken at `begin` on
//! failure.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use kaveri_client_core::api::ApiError;

use crate::notify::{Notifications, ToastLifetime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationField {
    Role,
    Suspension,
    Verification,
    Authorization,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MutationKey {
    pub entity_id: String,
    pub field: MutationField,
}

impl MutationKey {
    pub fn new(entity_id: impl Into<String>, field: MutationField) -> Self {
        Self {
            entity_id: entity_id.into(),
            field,
        }
    }
}

impl fmt::Display for MutationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", self.entity_id, self.field)
    }
}

/// When the local copy changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateStrategy {
    /// At `begin`, rolled back on failure.
    #[default]
    Optimistic,
    /// Only once the backend confirms.
    OnConfirm,
}

/// Toast text for both outcomes of one mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationLabels {
    pub success: Option<String>,
    pub failure: String,
    pub lifetime: ToastLifetime,
}

#[derive(Debug)]
#[must_use = "a pending mutation must be settled to release its key"]
pub struct PendingMutation<V> {
    key: MutationKey,
    previous: V,
    target: V,
    labels: MutationLabels,
}

impl<V> PendingMutation<V> {
    pub fn key(&self) -> &MutationKey {
        &self.key
    }

    pub fn previous(&self) -> &V {
        &self.previous
    }

    pub fn target(&self) -> &V {
        &self.target
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome<V> {
    Committed { key: MutationKey, value: V },
    RolledBack {
        key: MutationKey,
        value: V,
        error: ApiError,
    },
}

impl<V> MutationOutcome<V> {
    /// Value the local copy holds after settling.
    pub fn value(&self) -> &V {
        match self {
            Self::Committed { value, .. } | Self::RolledBack { value, .. } => value,
        }
    }

    pub fn into_value(self) -> V {
        match self {
            Self::Committed { value, .. } | Self::RolledBack { value, .. } => value,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Committed { .. } => None,
            Self::RolledBack { error, .. } => Some(error),
        }
    }
}

#[derive(Debug, Default)]
pub struct MutationController {
    strategy: UpdateStrategy,
    pending: HashSet<MutationKey>,
}

impl MutationController {
    #[must_use]
    pub fn new(strategy: UpdateStrategy) -> Self {
        Self {
            strategy,
            pending: HashSet::new(),
        }
    }

    #[must_use]
    pub fn strategy(&self) -> UpdateStrategy {
        self.strategy
    }

    #[must_use]
    pub fn is_pending(&self, key: &MutationKey) -> bool {
        self.pending.contains(key)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Marks `key` Pending. Returns `None` without side effects if it already is.
    pub fn begin<V>(
        &mut self,
        key: MutationKey,
        previous: V,
        target: V,
        labels: MutationLabels,
    ) -> Option<PendingMutation<V>> {
        if !self.pending.insert(key.clone()) {
            tracing::debug!(key = %key, "mutation already pending; trigger ignored");
            return None;
        }
        Some(PendingMutation {
            key,
            previous,
            target,
            labels,
        })
    }

    /// Writes the in-flight value into the local copy under the current
    /// strategy.
    pub fn stage<V: Clone>(&self, pending: &PendingMutation<V>, slot: &mut V) {
        match self.strategy {
            UpdateStrategy::Optimistic => *slot = pending.target.clone(),
            UpdateStrategy::OnConfirm => *slot = pending.previous.clone(),
        }
    }

    pub fn settle<V, T>(
        &mut self,
        pending: PendingMutation<V>,
        result: Result<T, ApiError>,
        notifications: &mut Notifications,
        now: DateTime<Utc>,
    ) -> MutationOutcome<V> {
        let PendingMutation {
            key,
            previous,
            target,
            labels,
        } = pending;
        self.pending.remove(&key);

        match result {
            Ok(_) => {
                if let Some(message) = labels.success {
                    notifications.success(message, labels.lifetime, now);
                }
                MutationOutcome::Committed { key, value: target }
            }
            Err(error) => {
                tracing::warn!(key = %key, reason = %error, "mutation rolled back");
                notifications.error(labels.failure, labels.lifetime, now);
                MutationOutcome::RolledBack {
                    key,
                    value: previous,
                    error,
                }
            }
        }
    }
}
