use super::{
    client::{user_facing, Client},
    session::describe_report,
};
use crate::{auth::route::Route, cli::globals::GlobalArgs};
use anyhow::{anyhow, Result};
use secrecy::SecretString;

pub struct Args {
    pub globals: GlobalArgs,
    pub password: SecretString,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("globals", &self.globals)
            .field("password", &"***")
            .finish()
    }
}

/// Re-prove the session with the account password.
/// # Errors
/// Returns the overlay notice when the password is rejected, or an error if the
/// session cannot be loaded.
pub async fn execute(args: Args) -> Result<()> {
    let client = Client::open(args.globals)?;
    let result = step_up(&client, &args.password).await;
    client.finish(result)
}

async fn step_up(client: &Client, password: &SecretString) -> Result<()> {
    let report = client.load().await?;
    let shell = client.shell();
    if !shell.context().is_logged_in() {
        return Err(anyhow!("Not signed in."));
    }
    if !shell.overlay().is_visible(&Route::Dashboard) {
        println!("refresh: {}", describe_report(&report));
        println!("step-up: not required");
        return Ok(());
    }

    match shell.overlay().submit(password).await {
        Ok(summary) => {
            println!("step-up: password confirmed");
            println!(
                "re-issued {} request(s): {} recovered, {} still failing",
                summary.retried, summary.recovered, summary.still_failing
            );
            Ok(())
        }
        Err(err) => Err(shell
            .overlay()
            .notice()
            .map_or_else(|| user_facing(err), |notice| anyhow!(notice))),
    }
}

/// "Not you? Sign out": always completes locally, the server call is best-effort.
/// # Errors
/// Returns an error if the state file cannot be read or written.
pub async fn sign_out(globals: GlobalArgs) -> Result<()> {
    let mut client = Client::open(globals)?;
    client.shell().overlay().sign_out().await;
    client.state_mut().mfa_masked_email = None;
    println!("signed out");
    client.finish(Ok(()))
}
