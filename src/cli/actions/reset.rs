use super::client::{user_facing, Client};
use crate::{
    auth::{code::OtpCode, reset::ResetStep, route::Route},
    cli::globals::GlobalArgs,
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;

pub enum Command {
    Start {
        email: String,
    },
    Verify {
        code: String,
    },
    Resend,
    Change {
        token: String,
        password: SecretString,
        confirm: SecretString,
    },
    Link {
        url: String,
    },
    Cancel,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start { .. } => f.write_str("Start"),
            Self::Verify { .. } => f.write_str("Verify"),
            Self::Resend => f.write_str("Resend"),
            Self::Change { .. } => f.write_str("Change"),
            Self::Link { .. } => f.write_str("Link"),
            Self::Cancel => f.write_str("Cancel"),
        }
    }
}

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub command: Command,
}

const NO_RECOVERY: &str = "No password recovery in progress. Run `carenotes reset start <email>` first.";

/// Password recovery.
/// # Errors
/// Returns an error for invalid input, a rejected code or token, or a failed
/// service call.
pub async fn execute(args: Args) -> Result<()> {
    let client = Client::open(args.globals)?;
    let result = reset(&client, args.command).await;
    client.finish(result)
}

async fn reset(client: &Client, command: Command) -> Result<()> {
    let flow = client.reset_flow();

    match command {
        Command::Start { email } => {
            let step = flow.locate(&email).await.map_err(user_facing)?;
            println!("{}", describe_step(&step));
        }
        Command::Verify { code } => {
            let code = OtpCode::parse(&code).map_err(user_facing)?;
            if flow.enter(&Route::ForgotPassword) == Ok(ResetStep::Locate) {
                return Err(anyhow!(NO_RECOVERY));
            }
            let navigation = flow.verify(&code).await.map_err(user_facing)?;
            let link = navigation
                .route
                .to_url(&client.globals().config.app_base_url)
                .context("failed to build the reset link")?;
            println!("code verified");
            println!("set a new password at {link}");
        }
        Command::Resend => {
            if flow.enter(&Route::ForgotPassword) == Ok(ResetStep::Locate) {
                return Err(anyhow!(NO_RECOVERY));
            }
            let masked_email = flow.resend().await.map_err(user_facing)?;
            println!("new code sent to {masked_email}");
        }
        Command::Change {
            token,
            password,
            confirm,
        } => {
            flow.enter(&Route::ResetPassword { token: Some(token) })
                .map_err(|redirect| anyhow!("Reset token is missing; go to {redirect}."))?;
            let navigation = flow.change(&password, &confirm).await.map_err(user_facing)?;
            println!("password changed");
            let destination = navigation.follow().await;
            println!("continue to {destination}");
        }
        Command::Link { url } => match flow.enter(&Route::parse(&url)) {
            Ok(step) => println!("{}", describe_step(&step)),
            Err(redirect) => println!("redirect to {redirect}"),
        },
        Command::Cancel => {
            flow.start_over();
            println!("password recovery cancelled");
        }
    }
    Ok(())
}

fn describe_step(step: &ResetStep) -> String {
    match step {
        ResetStep::Locate => "enter your email address".to_string(),
        ResetStep::Verify { masked_email } => format!("code sent to {masked_email}"),
        ResetStep::Change => "ready to set a new password".to_string(),
        ResetStep::Done => "password changed".to_string(),
    }
}
