//! Application root: chooses between the offline fallback and the current
//! route, and follows session invalidation back to login.

use kaveri_client_core::session::SessionStatus;
use tokio::sync::watch;

use crate::AppContext;
use crate::connectivity::{ConnectivityMonitor, ConnectivitySubscription};
use crate::route::{self, AppRoute};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootView {
    /// Static fallback; see [`crate::connectivity::OFFLINE_TITLE`].
    Offline,
    Route(AppRoute),
}

#[derive(Debug)]
pub struct AppShell {
    route: AppRoute,
    connectivity: ConnectivitySubscription,
    session_status: watch::Receiver<SessionStatus>,
}

impl AppShell {
    /// Mounts the root at `initial`, running the route gate once.
    pub fn mount(ctx: &AppContext, monitor: &ConnectivityMonitor, initial: AppRoute) -> Self {
        let route = route::admit(initial, ctx.session(), ctx.now()).route();
        Self {
            route,
            connectivity: monitor.subscribe(),
            session_status: ctx.session().subscribe(),
        }
    }

    #[must_use]
    pub fn route(&self) -> &AppRoute {
        &self.route
    }

    /// Moves to `target` through the route gate and returns where it landed.
    pub fn navigate(&mut self, ctx: &AppContext, target: AppRoute) -> &AppRoute {
        self.route = route::admit(target, ctx.session(), ctx.now()).route();
        &self.route
    }

    /// What the root renders right now.
    pub fn view(&mut self) -> RootView {
        self.follow_session();
        // Consume the change marker; the current value is read below.
        let _ = self.connectivity.take_change();
        if self.connectivity.is_online() {
            RootView::Route(self.route.clone())
        } else {
            RootView::Offline
        }
    }

    fn follow_session(&mut self) {
        if !matches!(self.session_status.has_changed(), Ok(true)) {
            return;
        }
        let status = *self.session_status.borrow_and_update();
        if status != SessionStatus::Active && self.route.requires_session() {
            tracing::info!(status = ?status, from = %self.route, "session ended; routing to login");
            self.route = AppRoute::Login;
        }
    }
}
