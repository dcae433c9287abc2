use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use kaveri_app_state::agent_detail::AgentDetailScreen;
use kaveri_app_state::agent_list::AgentListScreen;
use kaveri_app_state::clock::ManualClock;
use kaveri_app_state::connectivity::{Connectivity, ConnectivityMonitor};
use kaveri_app_state::dashboard::{DashboardScreen, StatKind};
use kaveri_app_state::login::{LoginError, LoginForm};
use kaveri_app_state::mutation::MutationOutcome;
use kaveri_app_state::notify::{Notifications, ToastLevel};
use kaveri_app_state::recharge::{AMOUNT_REQUIRED, NAME_REQUIRED, RECHARGE_FAILED, RechargeOutcome};
use kaveri_app_state::route::AppRoute;
use kaveri_app_state::shell::{AppShell, RootView};
use kaveri_app_state::{AppContext, ScreenError};
use kaveri_client_core::api::{AdminApi, ApiError};
use kaveri_client_core::auth::{LoginRequest, LoginResponse};
use kaveri_client_core::models::{
    AddCreditsRequest, AgentProfile, AgentRecord, AgentRole, AgentUpdate, CreditLogEntry,
    LetterRecord,
};
use kaveri_client_core::session::{MemoryCredentialStore, SessionContext, SessionStatus};
use kaveri_client_core::testing::{fresh_manager_token, token_with_role};
use kaveri_client_core::token_gate::LoginRejection;
use serde_json::{Value, json};

#[derive(Debug, Default)]
struct FakeState {
    agents: Vec<AgentRecord>,
    letters: Vec<LetterRecord>,
    logs: Vec<CreditLogEntry>,
    login_token: Option<String>,
    fail_updates: bool,
    fail_reads: bool,
    reject_session: bool,
    updates: Vec<(String, AgentUpdate)>,
    letter_patches: Vec<(String, bool)>,
    recharges: Vec<AddCreditsRequest>,
    login_emails: Vec<String>,
}

/// In-memory backend. A rejected session is handled the way the HTTP client
/// handles a 401: the session is invalidated before the error is returned.
#[derive(Debug)]
struct FakeApi {
    session: SessionContext,
    state: Mutex<FakeState>,
}

impl FakeApi {
    fn new(session: SessionContext) -> Self {
        Self {
            session,
            state: Mutex::new(FakeState::default()),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut *guard)
    }

    fn gate(&self) -> Result<(), ApiError> {
        if self.with(|state| state.reject_session) {
            let message = "jwt expired".to_string();
            self.session.invalidate(&message);
            return Err(ApiError::Unauthenticated { message });
        }
        Ok(())
    }

    fn read_failure(&self) -> Result<(), ApiError> {
        if self.with(|state| state.fail_reads) {
            return Err(ApiError::Http {
                status: 500,
                message: "Request failed".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AdminApi for FakeApi {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.with(|state| state.login_emails.push(request.email.clone()));
        if request.password != "secret" {
            return Err(ApiError::Http {
                status: 401,
                message: "Invalid credentials".to_string(),
            });
        }
        Ok(LoginResponse {
            token: self.with(|state| state.login_token.clone()),
        })
    }

    async fn list_agents(&self) -> Result<Vec<AgentRecord>, ApiError> {
        self.gate()?;
        self.read_failure()?;
        Ok(self.with(|state| state.agents.clone()))
    }

    async fn agent_profile(&self, kaveri_id: &str) -> Result<AgentProfile, ApiError> {
        self.gate()?;
        let user = self
            .with(|state| {
                state
                    .agents
                    .iter()
                    .find(|agent| agent.kaveri_id == kaveri_id)
                    .cloned()
            })
            .ok_or_else(|| ApiError::Http {
                status: 404,
                message: "Agent not found".to_string(),
            })?;
        Ok(AgentProfile {
            user,
            credits: Some(1_000.0),
            available_credits: Some(400.0),
        })
    }

    async fn agent_letters(&self, _kaveri_id: &str) -> Result<Vec<LetterRecord>, ApiError> {
        self.gate()?;
        self.read_failure()?;
        Ok(self.with(|state| state.letters.clone()))
    }

    async fn agent_credit_logs(&self, _kaveri_id: &str) -> Result<Vec<CreditLogEntry>, ApiError> {
        self.gate()?;
        Ok(self.with(|state| state.logs.clone()))
    }

    async fn all_letters(&self) -> Result<Vec<LetterRecord>, ApiError> {
        self.gate()?;
        self.read_failure()?;
        Ok(self.with(|state| state.letters.clone()))
    }

    async fn update_agent(&self, kaveri_id: &str, update: &AgentUpdate) -> Result<Value, ApiError> {
        self.gate()?;
        self.with(|state| {
            state.updates.push((kaveri_id.to_string(), update.clone()));
            if state.fail_updates {
                return Err(ApiError::Http {
                    status: 500,
                    message: "Request failed".to_string(),
                });
            }
            if let Some(agent) = state
                .agents
                .iter_mut()
                .find(|agent| agent.kaveri_id == kaveri_id)
            {
                if let Some(role) = &update.role {
                    agent.role = role.clone();
                }
                if let Some(suspended) = update.is_suspended {
                    agent.is_suspended = suspended;
                }
                if let Some(verified) = update.verification_status {
                    agent.verification_status = verified;
                }
            }
            Ok(json!({ "message": "User updated" }))
        })
    }

    async fn add_credits(&self, request: &AddCreditsRequest) -> Result<Value, ApiError> {
        self.gate()?;
        self.with(|state| {
            if state.fail_updates {
                return Err(ApiError::Transport {
                    message: "connection reset".to_string(),
                });
            }
            state.recharges.push(request.clone());
            Ok(json!({ "message": "Credits added" }))
        })
    }

    async fn authorize_letter(&self, letter_id: &str, authorized: bool) -> Result<Value, ApiError> {
        self.gate()?;
        self.with(|state| {
            state.letter_patches.push((letter_id.to_string(), authorized));
            if state.fail_updates {
                return Err(ApiError::Http {
                    status: 500,
                    message: "Request failed".to_string(),
                });
            }
            Ok(Value::Null)
        })
    }
}

fn agent(kaveri_id: &str, role: &str, verified: bool, suspended: bool) -> AgentRecord {
    serde_json::from_value(json!({
        "_id": format!("id_{kaveri_id}"),
        "kaveriId": kaveri_id,
        "name": format!("Agent {kaveri_id}"),
        "role": role,
        "verificationStatus": verified,
        "isSuspended": suspended
    }))
    .expect("agent fixture")
}

fn letter(id: &str, authorized: bool) -> LetterRecord {
    serde_json::from_value(json!({
        "_id": id,
        "studentName": "Ravi",
        "course": "BSc Nursing",
        "authorized": authorized
    }))
    .expect("letter fixture")
}

fn log(amount: f64, added_at: &str) -> CreditLogEntry {
    serde_json::from_value(json!({ "amount": amount, "addedAt": added_at })).expect("log fixture")
}

struct Harness {
    api: Arc<FakeApi>,
    clock: Arc<ManualClock>,
    ctx: AppContext,
}

fn signed_in() -> Harness {
    let session = SessionContext::new(MemoryCredentialStore::with_credential(
        fresh_manager_token(),
    ));
    harness(session)
}

fn harness(session: SessionContext) -> Harness {
    let api = Arc::new(FakeApi::new(session.clone()));
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let ctx = AppContext::new(api.clone(), session).with_clock(clock.clone());
    Harness { api, clock, ctx }
}

#[tokio::test]
async fn promote_commits_closes_dialog_and_toasts() -> Result<()> {
    let h = signed_in();
    h.api
        .with(|state| state.agents = vec![agent("K1", "agent", true, false)]);

    let mut screen = AgentDetailScreen::new("K1");
    screen.load(&h.ctx).await?;
    assert!(screen.can_change_role());
    let change = screen.open_role_dialog().cloned().expect("dialog opens");
    assert_eq!(change.verb(), "promote");

    let outcome = screen
        .confirm_role_change(&h.ctx)
        .await
        .expect("mutation runs");
    assert!(outcome.is_committed());
    assert_eq!(
        screen.profile().map(|profile| profile.user.role.clone()),
        Some(AgentRole::Admin)
    );
    assert!(screen.role_dialog().is_none());
    assert!(!screen.is_role_change_pending());

    let toast = screen.notifications().latest().expect("toast");
    assert_eq!(toast.level, ToastLevel::Success);
    assert_eq!(toast.message, "User successfully promoted to admin!");
    assert_eq!(
        screen
            .notifications()
            .visible(h.ctx.now() + Duration::seconds(1))
            .count(),
        0
    );

    let updates = h.api.with(|state| state.updates.clone());
    assert_eq!(updates, vec![("K1".to_string(), AgentUpdate::role(AgentRole::Admin))]);
    Ok(())
}

#[tokio::test]
async fn suspend_failure_rolls_back_and_keeps_dialog() -> Result<()> {
    let h = signed_in();
    h.api.with(|state| {
        state.agents = vec![agent("K1", "agent", true, false)];
        state.fail_updates = true;
    });

    let mut screen = AgentDetailScreen::new("K1");
    screen.load(&h.ctx).await?;
    let change = screen.open_suspend_dialog().expect("dialog opens");
    assert_eq!(change.verb(), "suspend");

    let outcome = screen
        .confirm_suspension(&h.ctx)
        .await
        .expect("mutation runs");
    assert!(matches!(outcome, MutationOutcome::RolledBack { value: false, .. }));
    assert_eq!(
        screen.profile().map(|profile| profile.user.is_suspended),
        Some(false)
    );
    assert!(screen.suspend_dialog().is_some());
    assert!(!screen.is_suspension_pending());

    let toast = screen.notifications().latest().expect("toast");
    assert_eq!(toast.level, ToastLevel::Error);
    assert_eq!(toast.message, "Failed to suspend user. Please try again.");
    Ok(())
}

fn set_agent(api: &FakeApi, kaveri_id: &str, edit: impl FnOnce(&mut AgentRecord)) {
    api.with(|state| {
        if let Some(agent) = state
            .agents
            .iter_mut()
            .find(|agent| agent.kaveri_id == kaveri_id)
        {
            edit(agent);
        }
    });
}

#[tokio::test]
async fn role_rollback_after_reload_keeps_confirmed_role() -> Result<()> {
    let h = signed_in();
    h.api
        .with(|state| state.agents = vec![agent("K1", "agent", true, false)]);

    let mut screen = AgentDetailScreen::new("K1");
    screen.load(&h.ctx).await?;
    screen.open_role_dialog();

    set_agent(&h.api, "K1", |agent| agent.role = AgentRole::Admin);
    screen.load(&h.ctx).await?;
    assert_eq!(
        screen.profile().map(|profile| profile.user.role.clone()),
        Some(AgentRole::Admin)
    );

    h.api.with(|state| state.fail_updates = true);
    let outcome = screen.confirm_role_change(&h.ctx).await.expect("runs");
    assert!(!outcome.is_committed());
    assert_eq!(outcome.value(), &AgentRole::Admin);
    assert_eq!(
        screen.profile().map(|profile| profile.user.role.clone()),
        Some(AgentRole::Admin)
    );
    assert!(screen.role_dialog().is_some());
    assert_eq!(
        screen.notifications().latest().map(|toast| toast.message.as_str()),
        Some("Failed to promote user. Please try again.")
    );
    Ok(())
}

#[tokio::test]
async fn role_dialog_sends_the_target_captured_at_open() -> Result<()> {
    let h = signed_in();
    h.api
        .with(|state| state.agents = vec![agent("K1", "admin", true, false)]);

    let mut screen = AgentDetailScreen::new("K1");
    screen.load(&h.ctx).await?;
    assert_eq!(screen.open_role_dialog().map(|change| change.verb()), Some("demote"));

    set_agent(&h.api, "K1", |agent| agent.role = AgentRole::Agent);
    screen.load(&h.ctx).await?;
    assert_eq!(screen.role_dialog().map(|change| change.verb()), Some("demote"));

    let outcome = screen.confirm_role_change(&h.ctx).await.expect("runs");
    assert!(outcome.is_committed());
    assert_eq!(outcome.value(), &AgentRole::Agent);
    assert_eq!(
        h.api.with(|state| state.updates.clone()),
        vec![("K1".to_string(), AgentUpdate::role(AgentRole::Agent))]
    );
    assert_eq!(
        screen.notifications().latest().map(|toast| toast.message.as_str()),
        Some("User successfully demoted to agent!")
    );
    Ok(())
}

#[tokio::test]
async fn role_change_dropped_once_reload_shows_suspension() -> Result<()> {
    let h = signed_in();
    h.api
        .with(|state| state.agents = vec![agent("K1", "agent", true, false)]);

    let mut screen = AgentDetailScreen::new("K1");
    screen.load(&h.ctx).await?;
    assert!(screen.open_role_dialog().is_some());

    set_agent(&h.api, "K1", |agent| agent.is_suspended = true);
    screen.load(&h.ctx).await?;
    assert!(screen.confirm_role_change(&h.ctx).await.is_none());
    assert!(screen.role_dialog().is_none());
    assert!(h.api.with(|state| state.updates.is_empty()));
    Ok(())
}

#[tokio::test]
async fn suspend_dialog_keeps_snapshot_target_and_reloaded_rollback() -> Result<()> {
    let h = signed_in();
    h.api.with(|state| {
        state.agents = vec![
            agent("K1", "agent", true, false),
            agent("K2", "agent", true, false),
        ];
    });

    let mut first = AgentDetailScreen::new("K1");
    first.load(&h.ctx).await?;
    assert_eq!(first.open_suspend_dialog().map(|change| change.verb()), Some("suspend"));
    set_agent(&h.api, "K1", |agent| agent.is_suspended = true);
    first.load(&h.ctx).await?;
    let outcome = first.confirm_suspension(&h.ctx).await.expect("runs");
    assert!(outcome.is_committed());
    assert_eq!(
        h.api.with(|state| state.updates.clone()),
        vec![("K1".to_string(), AgentUpdate::suspension(true))]
    );
    assert_eq!(
        first.notifications().latest().map(|toast| toast.message.as_str()),
        Some("User successfully suspended!")
    );

    let mut second = AgentDetailScreen::new("K2");
    second.load(&h.ctx).await?;
    second.open_suspend_dialog();
    set_agent(&h.api, "K2", |agent| agent.is_suspended = true);
    second.load(&h.ctx).await?;
    h.api.with(|state| state.fail_updates = true);
    let outcome = second.confirm_suspension(&h.ctx).await.expect("runs");
    assert!(matches!(outcome, MutationOutcome::RolledBack { value: true, .. }));
    assert_eq!(
        second.profile().map(|profile| profile.user.is_suspended),
        Some(true)
    );
    assert_eq!(
        second.notifications().latest().map(|toast| toast.message.as_str()),
        Some("Failed to suspend user. Please try again.")
    );
    Ok(())
}

#[tokio::test]
async fn role_controls_hidden_for_suspended_agents() -> Result<()> {
    let h = signed_in();
    h.api
        .with(|state| state.agents = vec![agent("K3", "admin", true, true)]);

    let mut screen = AgentDetailScreen::new("K3");
    screen.load(&h.ctx).await?;
    assert_eq!(screen.status_label(), Some("Suspended"));
    assert!(!screen.can_change_role());
    assert!(screen.open_role_dialog().is_none());
    assert!(screen.confirm_role_change(&h.ctx).await.is_none());

    assert_eq!(
        screen.open_suspend_dialog().map(|change| change.verb()),
        Some("restore")
    );
    let outcome = screen.confirm_suspension(&h.ctx).await.expect("runs");
    assert!(outcome.is_committed());
    assert_eq!(
        screen.notifications().latest().map(|toast| toast.message.as_str()),
        Some("User successfully restored!")
    );
    assert!(screen.can_change_role());
    Ok(())
}

#[tokio::test]
async fn letter_toggle_marks_authorized() -> Result<()> {
    let h = signed_in();
    h.api.with(|state| {
        state.agents = vec![agent("K1", "agent", true, false)];
        state.letters = vec![letter("L1", false), letter("L2", true)];
    });

    let mut screen = AgentDetailScreen::new("K1");
    screen.load(&h.ctx).await?;
    let outcome = screen
        .toggle_letter(&h.ctx, "L1")
        .await
        .expect("letter exists");
    assert!(outcome.is_committed());
    assert_eq!(
        screen.letters().letter("L1").map(|letter| letter.authorized),
        Some(true)
    );
    assert_eq!(
        screen.notifications().latest().map(|toast| toast.message.as_str()),
        Some("Letter marked as authorized.")
    );
    assert!(screen.toggle_letter(&h.ctx, "missing").await.is_none());
    assert_eq!(
        h.api.with(|state| state.letter_patches.clone()),
        vec![("L1".to_string(), true)]
    );
    Ok(())
}

#[tokio::test]
async fn letter_toggle_failure_restores_value() -> Result<()> {
    let h = signed_in();
    h.api.with(|state| {
        state.agents = vec![agent("K1", "agent", true, false)];
        state.letters = vec![letter("L2", true)];
        state.fail_updates = true;
    });

    let mut screen = AgentDetailScreen::new("K1");
    screen.load(&h.ctx).await?;
    let outcome = screen.toggle_letter(&h.ctx, "L2").await.expect("runs");
    assert!(!outcome.is_committed());
    assert_eq!(
        screen.letters().letter("L2").map(|letter| letter.authorized),
        Some(true)
    );
    assert_eq!(
        screen.notifications().latest().map(|toast| toast.message.as_str()),
        Some("Failed to update letter status.")
    );
    assert!(!screen.letters().is_updating("L2"));
    Ok(())
}

#[tokio::test]
async fn detail_orders_logs_and_tolerates_letter_failure() -> Result<()> {
    let h = signed_in();
    h.api.with(|state| {
        state.agents = vec![agent("K1", "agent", false, true)];
        state.letters = vec![letter("L1", false)];
        state.logs = vec![
            log(100.0, "2025-01-01T00:00:00Z"),
            log(300.0, "2025-03-01T00:00:00Z"),
            log(200.0, "2025-02-01T00:00:00Z"),
        ];
        state.fail_reads = true;
    });

    let mut screen = AgentDetailScreen::new("K1");
    screen.load(&h.ctx).await?;
    assert_eq!(screen.status_label(), Some("Blocked"));
    assert!(screen.letters().letters().is_empty());
    let amounts: Vec<f64> = screen
        .credit_logs()
        .iter()
        .map(|entry| entry.amount)
        .collect();
    assert_eq!(amounts, vec![300.0, 200.0, 100.0]);
    Ok(())
}

#[tokio::test]
async fn rejected_session_routes_shell_to_login() -> Result<()> {
    let h = signed_in();
    let monitor = ConnectivityMonitor::default();
    let detail = AppRoute::AgentDetail {
        kaveri_id: "K1".to_string(),
    };
    let mut shell = AppShell::mount(&h.ctx, &monitor, detail.clone());
    assert_eq!(shell.view(), RootView::Route(detail));

    h.api.with(|state| {
        state.agents = vec![agent("K1", "agent", true, false)];
        state.reject_session = true;
    });
    let mut screen = AgentDetailScreen::new("K1");
    let error = screen.load(&h.ctx).await.expect_err("401");
    assert!(error.requires_login());
    assert_eq!(h.ctx.session().status(), SessionStatus::Expired);
    assert_eq!(h.ctx.session().credential(), None);
    assert_eq!(shell.view(), RootView::Route(AppRoute::Login));
    Ok(())
}

#[tokio::test]
async fn expired_credential_never_reaches_the_backend() -> Result<()> {
    let now = Utc::now();
    let stale = token_with_role("manager", now - Duration::seconds(5));
    let h = harness(SessionContext::new(MemoryCredentialStore::with_credential(
        stale,
    )));

    let mut dashboard = DashboardScreen::default();
    let error = dashboard.enter(&h.ctx).await.expect_err("gated");
    assert!(matches!(error, ScreenError::SessionRequired(_)));
    assert_eq!(h.ctx.session().credential(), None);

    let monitor = ConnectivityMonitor::default();
    let mut shell = AppShell::mount(&h.ctx, &monitor, AppRoute::Dashboard);
    assert_eq!(shell.view(), RootView::Route(AppRoute::Login));
    Ok(())
}

#[tokio::test]
async fn offline_fallback_then_restored_view() -> Result<()> {
    let h = signed_in();
    h.api.with(|state| {
        state.agents = vec![agent("K1", "agent", true, false)];
        state.letters = vec![letter("L1", true)];
    });
    let monitor = ConnectivityMonitor::new(Connectivity::Online);
    let mut shell = AppShell::mount(&h.ctx, &monitor, AppRoute::Dashboard);
    let mut dashboard = DashboardScreen::default();
    dashboard.enter(&h.ctx).await?;
    let before = *dashboard.stats();

    assert_eq!(monitor.subscriber_count(), 1);
    monitor.set_offline();
    assert_eq!(shell.view(), RootView::Offline);
    monitor.set_online();
    assert_eq!(shell.view(), RootView::Route(AppRoute::Dashboard));
    assert_eq!(*dashboard.stats(), before);

    drop(shell);
    assert_eq!(monitor.subscriber_count(), 0);
    Ok(())
}

#[tokio::test]
async fn dashboard_stats_and_trends() -> Result<()> {
    let h = signed_in();
    h.api.with(|state| {
        state.agents = vec![
            agent("K1", "agent", true, false),
            agent("K2", "agent", false, false),
            agent("K3", "admin", true, true),
        ];
        state.letters = vec![letter("L1", true), letter("L2", false), letter("L3", false)];
    });

    let mut dashboard = DashboardScreen::default();
    dashboard.enter(&h.ctx).await?;
    let stats = *dashboard.stats();
    assert_eq!(stats.total_users.current, 2);
    assert_eq!(stats.pending_users.current, 1);
    assert_eq!(stats.letters_generated.current, 3);
    assert_eq!(stats.amount_received.current, 30_000);
    assert_eq!(stats.unauthorized_amount, 20_000);
    assert_eq!(stats.authorized_amount(), 10_000);
    assert_eq!(stats.trend(StatKind::TotalUsers).label, "100%");
    assert_eq!(stats.trend(StatKind::PendingUsers).label, "1");
    assert_eq!(dashboard.recharge().candidates().len(), 2);
    assert_eq!(dashboard.agent_list().agents().len(), 2);

    h.api.with(|state| state.letters.push(letter("L4", true)));
    dashboard.refresh_letters(&h.ctx).await?;
    let stats = *dashboard.stats();
    assert_eq!(stats.letters_generated.previous, 3);
    assert_eq!(stats.trend(StatKind::LettersGenerated).label, "33.3%");

    h.api.with(|state| state.fail_reads = true);
    dashboard.refresh_letters(&h.ctx).await?;
    dashboard.refresh_users(&h.ctx).await?;
    assert_eq!(*dashboard.stats(), stats);
    Ok(())
}

#[tokio::test]
async fn agent_list_filters_and_verifies() -> Result<()> {
    let h = signed_in();
    h.api.with(|state| {
        state.agents = vec![
            agent("K1", "agent", false, false),
            agent("K2", "agent", true, true),
        ];
    });

    let mut list = AgentListScreen::default();
    let mut notifications = Notifications::default();
    list.refresh(&h.ctx).await?;
    assert_eq!(list.agents().len(), 1);
    assert_eq!(list.agents()[0].kaveri_id, "K1");

    let outcome = list
        .set_verification(&h.ctx, "K1", true, &mut notifications)
        .await
        .expect("listed agent");
    assert!(outcome.is_committed());
    assert!(list.agents()[0].verification_status);

    list.toggle_show_suspended(&h.ctx).await?;
    assert!(list.show_suspended());
    assert_eq!(list.agents().len(), 1);
    assert_eq!(list.agents()[0].kaveri_id, "K2");

    h.api.with(|state| state.fail_updates = true);
    let outcome = list
        .set_verification(&h.ctx, "K2", false, &mut notifications)
        .await
        .expect("listed agent");
    assert!(!outcome.is_committed());
    assert!(list.agents()[0].verification_status);
    assert_eq!(
        notifications.latest().map(|toast| toast.message.as_str()),
        Some("Failed to block user. Please try again.")
    );
    Ok(())
}

#[tokio::test]
async fn recharge_validates_submits_and_reports_failure() -> Result<()> {
    let h = signed_in();
    h.api.with(|state| {
        state.agents = vec![agent("K1", "agent", true, false), agent("K2", "agent", false, false)];
    });
    let mut dashboard = DashboardScreen::default();
    dashboard.enter(&h.ctx).await?;

    let outcome = dashboard.submit_recharge(&h.ctx).await;
    let RechargeOutcome::Invalid(errors) = outcome else {
        panic!("expected validation errors, got {outcome:?}");
    };
    assert_eq!(errors.name, Some(NAME_REQUIRED));
    assert_eq!(errors.amount, Some(AMOUNT_REQUIRED));

    assert!(!dashboard.recharge_mut().select("K2"), "unverified agents are not candidates");
    assert!(dashboard.recharge_mut().select("K1"));
    dashboard.recharge_mut().set_amount("1500");
    let outcome = dashboard.submit_recharge(&h.ctx).await;
    assert_eq!(
        outcome,
        RechargeOutcome::Completed {
            kaveri_id: "K1".to_string(),
            amount: 1500.0
        }
    );
    assert!(dashboard.recharge().selected().is_none());
    assert_eq!(dashboard.recharge().amount(), "");
    let now = h.ctx.now();
    assert!(dashboard.recharge().success_visible(now));
    h.clock.advance(Duration::seconds(3));
    assert!(!dashboard.recharge().success_visible(h.ctx.now()));
    assert_eq!(h.api.with(|state| state.recharges.len()), 1);

    h.api.with(|state| state.fail_updates = true);
    dashboard.recharge_mut().select("K1");
    dashboard.recharge_mut().set_amount("20");
    let outcome = dashboard.submit_recharge(&h.ctx).await;
    assert!(matches!(outcome, RechargeOutcome::Failed(_)));
    assert_eq!(dashboard.recharge().amount(), "20");
    let toast = dashboard.notifications_mut().latest().cloned().expect("toast");
    assert_eq!(toast.message, RECHARGE_FAILED);
    Ok(())
}

#[tokio::test]
async fn login_admits_managers_only() -> Result<()> {
    let h = harness(SessionContext::in_memory());

    h.api.with(|state| {
        state.login_token = Some(token_with_role("agent", Utc::now() + Duration::hours(1)));
    });
    let mut form = LoginForm::new("agent@kaveri.example", "secret");
    let error = form.submit(&h.ctx).await.expect_err("agent refused");
    assert!(matches!(
        error,
        LoginError::Rejected(LoginRejection::NotAuthorized { .. })
    ));
    assert_eq!(form.error(), Some("Access denied. You are not Authorized."));
    assert_eq!(h.ctx.session().credential(), None);

    h.api.with(|state| state.login_token = None);
    let error = form.submit(&h.ctx).await.expect_err("no token");
    assert_eq!(error.to_string(), "Invalid token received.");

    let mut wrong = LoginForm::new("manager@kaveri.example", "nope");
    let error = wrong.submit(&h.ctx).await.expect_err("bad password");
    assert_eq!(error.to_string(), "Invalid credentials");

    let token = fresh_manager_token();
    h.api.with(|state| state.login_token = Some(token.clone()));
    let mut form = LoginForm::new(" Manager@Kaveri.example ", "secret");
    let route = form.submit(&h.ctx).await?;
    assert_eq!(route, AppRoute::Dashboard);
    assert_eq!(form.error(), None);
    assert_eq!(h.ctx.session().credential(), Some(token));
    assert_eq!(h.ctx.session().status(), SessionStatus::Active);
    assert_eq!(
        h.api.with(|state| state.login_emails.last().cloned()),
        Some("Manager@Kaveri.example".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn logout_clears_session() -> Result<()> {
    let h = signed_in();
    let dashboard = DashboardScreen::default();
    assert_eq!(dashboard.logout(&h.ctx), AppRoute::Login);
    assert_eq!(h.ctx.session().credential(), None);
    assert_eq!(h.ctx.session().status(), SessionStatus::SignedOut);
    Ok(())
}
