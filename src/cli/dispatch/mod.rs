use crate::{
    api::config::{ClientConfig, Overrides},
    cli::{
        actions::{mfa, reset, session, step_up, Action},
        commands::{self, mfa as mfa_args, reset as reset_args},
        globals::GlobalArgs,
    },
};
use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let globals = globals(matches)?;

    let action = match matches.subcommand() {
        Some(("session", sub_m)) => Action::Session(session::Args {
            globals,
            route: sub_m.get_one::<String>(commands::ARG_ROUTE).cloned(),
        }),
        Some(("watch", _)) => Action::Watch(globals),
        Some(("step-up", sub_m)) => Action::StepUp(step_up::Args {
            globals,
            password: secret(sub_m, commands::ARG_PASSWORD)?,
        }),
        Some(("sign-out", _)) => Action::SignOut(globals),
        Some(("mfa", sub_m)) => Action::Mfa(mfa::Args {
            globals,
            command: mfa_command(sub_m)?,
        }),
        Some(("reset", sub_m)) => Action::Reset(reset::Args {
            globals,
            command: reset_command(sub_m)?,
        }),
        _ => return Err(anyhow!("unknown command")),
    };

    Ok(action)
}

fn globals(matches: &ArgMatches) -> Result<GlobalArgs> {
    let api_url = matches
        .get_one::<String>(commands::ARG_API_URL)
        .context("missing required argument: --api-url")?;

    let config = ClientConfig::new(api_url)
        .context("invalid CARENOTES_API_URL")?
        .with_overrides(Overrides {
            app_base_url: matches.get_one::<String>(commands::ARG_APP_URL).cloned(),
            request_timeout_secs: matches
                .get_one::<u64>(commands::ARG_REQUEST_TIMEOUT)
                .copied(),
            focus_debounce_secs: matches.get_one::<u64>(commands::ARG_FOCUS_DEBOUNCE).copied(),
        })
        .context("invalid CARENOTES_APP_URL")?;

    let state_file = matches
        .get_one::<String>(commands::ARG_STATE_FILE)
        .map_or(commands::DEFAULT_STATE_FILE, String::as_str);

    Ok(GlobalArgs::new(config, state_file))
}

fn required(matches: &ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .with_context(|| format!("missing required argument: {name}"))
}

fn secret(matches: &ArgMatches, name: &str) -> Result<SecretString> {
    required(matches, name).map(SecretString::from)
}

fn mfa_command(matches: &ArgMatches) -> Result<mfa::Command> {
    match matches.subcommand() {
        Some(("send", _)) => Ok(mfa::Command::Send),
        Some(("resend", _)) => Ok(mfa::Command::Resend),
        Some(("verify", sub_m)) => Ok(mfa::Command::Verify(required(sub_m, mfa_args::ARG_CODE)?)),
        _ => Err(anyhow!("unknown mfa command")),
    }
}

fn reset_command(matches: &ArgMatches) -> Result<reset::Command> {
    let command = match matches.subcommand() {
        Some(("start", sub_m)) => reset::Command::Start {
            email: required(sub_m, reset_args::ARG_EMAIL)?,
        },
        Some(("verify", sub_m)) => reset::Command::Verify {
            code: required(sub_m, reset_args::ARG_CODE)?,
        },
        Some(("resend", _)) => reset::Command::Resend,
        Some(("change", sub_m)) => reset::Command::Change {
            token: required(sub_m, reset_args::ARG_TOKEN)?,
            password: secret(sub_m, reset_args::ARG_NEW_PASSWORD)?,
            confirm: secret(sub_m, reset_args::ARG_CONFIRM)?,
        },
        Some(("link", sub_m)) => reset::Command::Link {
            url: required(sub_m, reset_args::ARG_URL)?,
        },
        Some(("cancel", _)) => reset::Command::Cancel,
        _ => return Err(anyhow!("unknown reset command")),
    };
    Ok(command)
}
