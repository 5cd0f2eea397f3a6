//! One CLI invocation: the stored state, the HTTP session service built on top
//! of its cookies, and the app shell. Whatever the action did to the cookies or
//! the pending recovery challenge is written back on [`Client::finish`].

use crate::{
    api::{client::HttpSessionService, cookies::CookieJar},
    auth::{
        refresh::RefreshReport,
        reset::ResetFlow,
        shell::AppShell,
        store::{ChallengeStore, MemoryChallengeStore},
        AuthError,
    },
    cli::{globals::GlobalArgs, state::StateFile},
};
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) struct Client {
    globals: GlobalArgs,
    state: StateFile,
    service: Arc<HttpSessionService>,
    store: Arc<MemoryChallengeStore>,
    shell: AppShell<HttpSessionService>,
}

impl Client {
    pub(crate) fn open(globals: GlobalArgs) -> Result<Self> {
        let state = StateFile::load(&globals.state_file)?;
        let cookies = CookieJar::from_pairs(&globals.config.api_base_url, state.cookies.clone());
        let service = Arc::new(
            HttpSessionService::new(&globals.config, cookies)
                .context("failed to build the session service client")?,
        );
        let store = Arc::new(MemoryChallengeStore::new(state.pending_reset.clone()));
        let shell = AppShell::new(Arc::clone(&service), &globals.config);
        debug!(api = %globals.config.api_base_url, "client ready");
        Ok(Self {
            globals,
            state,
            service,
            store,
            shell,
        })
    }

    pub(crate) fn globals(&self) -> &GlobalArgs {
        &self.globals
    }

    pub(crate) fn state_mut(&mut self) -> &mut StateFile {
        &mut self.state
    }

    pub(crate) fn state(&self) -> &StateFile {
        &self.state
    }

    pub(crate) fn shell(&self) -> &AppShell<HttpSessionService> {
        &self.shell
    }

    pub(crate) fn reset_flow(&self) -> ResetFlow<HttpSessionService, MemoryChallengeStore> {
        self.shell.reset_flow(Arc::clone(&self.store))
    }

    /// Page load: validates the stored session when a marker cookie is present.
    pub(crate) async fn load(&self) -> Result<RefreshReport> {
        let has_marker = self.service.cookies().has_marker();
        self.shell
            .refresh()
            .on_load(has_marker)
            .await
            .map_err(user_facing)
    }

    fn save(&mut self) -> Result<()> {
        self.state.cookies = self.service.cookies().export();
        self.state.pending_reset = self.store.load();
        self.state.save(&self.globals.state_file)
    }

    /// Writes the state back, whether or not the action succeeded. The
    /// action's own error wins over a failed write.
    pub(crate) fn finish<T>(mut self, result: Result<T>) -> Result<T> {
        let saved = self.save();
        match result {
            Ok(value) => saved.map(|()| value),
            Err(err) => {
                if let Err(save_err) = saved {
                    warn!(error = %save_err, "failed to save state");
                }
                Err(err)
            }
        }
    }
}

/// Converts a controller error into its display text.
pub(crate) fn user_facing(err: AuthError) -> anyhow::Error {
    anyhow!(err.user_message())
}
