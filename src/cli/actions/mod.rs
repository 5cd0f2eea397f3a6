pub mod mfa;
pub mod reset;
pub mod session;
pub mod step_up;

mod client;
mod run;

use crate::cli::globals::GlobalArgs;

#[derive(Debug)]
pub enum Action {
    Session(session::Args),
    Watch(GlobalArgs),
    StepUp(step_up::Args),
    SignOut(GlobalArgs),
    Mfa(mfa::Args),
    Reset(reset::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
