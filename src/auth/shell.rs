//! App shell: owns the session context and the controllers that write it, and
//! decides what the mounted page may show.

use super::{
    context::SessionContext,
    guards::redirect_for,
    mfa::MfaFlow,
    recovery::RequestRegistry,
    refresh::{LoadPhase, RefreshController},
    reset::ResetFlow,
    route::Route,
    step_up::StepUpOverlay,
    store::ChallengeStore,
};
use crate::api::{config::ClientConfig, SessionService};
use std::{sync::Arc, time::Duration};

/// What the mounted page renders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gate {
    /// Session not validated yet; show a placeholder.
    Loading,
    /// Refresh failed; show the message with a retry action.
    RetryableError(String),
    Redirect(Route),
    /// Protected page covered by the step-up overlay.
    StepUp,
    Render,
}

pub struct AppShell<S> {
    service: Arc<S>,
    context: SessionContext,
    registry: RequestRegistry,
    refresh: RefreshController<S>,
    overlay: StepUpOverlay<S>,
    resend_cooldown: Duration,
    redirect_delay: Duration,
}

impl<S: SessionService> AppShell<S> {
    pub fn new(service: Arc<S>, config: &ClientConfig) -> Self {
        let context = SessionContext::new();
        let registry = RequestRegistry::new();
        Self {
            refresh: RefreshController::new(
                Arc::clone(&service),
                context.clone(),
                config.focus_debounce,
            ),
            overlay: StepUpOverlay::new(Arc::clone(&service), context.clone(), registry.clone()),
            service,
            context,
            registry,
            resend_cooldown: config.resend_cooldown,
            redirect_delay: config.redirect_delay,
        }
    }

    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    #[must_use]
    pub fn registry(&self) -> &RequestRegistry {
        &self.registry
    }

    #[must_use]
    pub fn refresh(&self) -> &RefreshController<S> {
        &self.refresh
    }

    #[must_use]
    pub fn overlay(&self) -> &StepUpOverlay<S> {
        &self.overlay
    }

    #[must_use]
    pub fn mfa_flow(&self) -> MfaFlow<S> {
        MfaFlow::new(
            Arc::clone(&self.service),
            self.context.clone(),
            self.resend_cooldown,
        )
    }

    #[must_use]
    pub fn reset_flow<St: ChallengeStore>(&self, store: Arc<St>) -> ResetFlow<S, St> {
        ResetFlow::new(
            Arc::clone(&self.service),
            store,
            self.resend_cooldown,
            self.redirect_delay,
        )
    }

    /// Combines the load phase, the page guard and the overlay.
    #[must_use]
    pub fn gate(&self, route: &Route) -> Gate {
        match self.refresh.phase() {
            LoadPhase::Idle | LoadPhase::Loading => return Gate::Loading,
            LoadPhase::Failed(message) => return Gate::RetryableError(message),
            LoadPhase::Ready => {}
        }
        if let Some(target) = redirect_for(route, &self.context.session()) {
            return Gate::Redirect(target);
        }
        if self.overlay.is_visible(route) {
            return Gate::StepUp;
        }
        Gate::Render
    }
}
