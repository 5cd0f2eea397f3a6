use super::client::{user_facing, Client};
use crate::{
    auth::{code::OtpCode, mfa::MfaStart, route::Route},
    cli::globals::GlobalArgs,
};
use anyhow::{anyhow, Result};

#[derive(Debug)]
pub enum Command {
    Send,
    Resend,
    Verify(String),
}

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub command: Command,
}

/// Masked address to keep for the next invocation.
enum Remember {
    Masked(String),
    Forget,
}

/// Second-factor verification for the signed-in session.
/// # Errors
/// Returns an error if there is no session, the code is rejected, or the
/// service call fails.
pub async fn execute(args: Args) -> Result<()> {
    let mut client = Client::open(args.globals)?;
    let result = mfa(&client, args.command).await;
    let result = result.map(|remember| match remember {
        Remember::Masked(masked_email) => client.state_mut().mfa_masked_email = Some(masked_email),
        Remember::Forget => client.state_mut().mfa_masked_email = None,
    });
    client.finish(result)
}

async fn mfa(client: &Client, command: Command) -> Result<Remember> {
    client.load().await?;
    let shell = client.shell();
    if !shell.context().is_logged_in() {
        return Err(anyhow!("Not signed in."));
    }
    let flow = shell.mfa_flow();

    match command {
        Command::Send => match flow.start().await.map_err(user_facing)? {
            MfaStart::CodeSent { masked_email } => {
                println!("code sent to {masked_email}");
                Ok(Remember::Masked(masked_email))
            }
            MfaStart::AlreadyVerified { destination } => {
                println!("already verified");
                print_destination(destination.as_ref());
                Ok(Remember::Forget)
            }
        },
        Command::Resend => {
            flow.resume(stored_masked_email(client)?);
            let masked_email = flow.resend().await.map_err(user_facing)?;
            println!("new code sent to {masked_email}");
            Ok(Remember::Masked(masked_email))
        }
        Command::Verify(code) => {
            let code = OtpCode::parse(&code).map_err(user_facing)?;
            flow.resume(stored_masked_email(client)?);
            let destination = flow.verify(&code).await.map_err(user_facing)?;
            println!("verified");
            print_destination(destination.as_ref());
            Ok(Remember::Forget)
        }
    }
}

fn stored_masked_email(client: &Client) -> Result<String> {
    client
        .state()
        .mfa_masked_email
        .clone()
        .ok_or_else(|| anyhow!("No code was requested yet. Run `carenotes mfa send` first."))
}

fn print_destination(destination: Option<&Route>) {
    if let Some(destination) = destination {
        println!("continue to {destination}");
    }
}
