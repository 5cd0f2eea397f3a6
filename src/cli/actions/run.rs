use crate::cli::actions::{mfa, reset, session, step_up, Action};
use anyhow::Result;

/// Execute the provided action.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Session(args) => session::execute(args).await,
        Action::Watch(globals) => session::watch(globals).await,
        Action::StepUp(args) => step_up::execute(args).await,
        Action::SignOut(globals) => step_up::sign_out(globals).await,
        Action::Mfa(args) => mfa::execute(args).await,
        Action::Reset(args) => reset::execute(args).await,
    }
}
