use super::client::Client;
use crate::{
    api::RefreshOutcome,
    auth::{
        refresh::{RefreshReport, SkipReason},
        route::Route,
        session::SessionRecord,
        shell::Gate,
    },
    cli::globals::GlobalArgs,
};
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub route: Option<String>,
}

/// Validate the stored session and print where it belongs.
/// # Errors
/// Returns an error if the refresh fails with a retryable error or the state
/// file cannot be read or written.
pub async fn execute(args: Args) -> Result<()> {
    let client = Client::open(args.globals)?;
    let result = show(&client, args.route.as_deref()).await;
    client.finish(result)
}

async fn show(client: &Client, route: Option<&str>) -> Result<()> {
    let loaded = client.load().await;
    if let Ok(report) = &loaded {
        println!("refresh: {}", describe_report(report));
    }

    let context = client.shell().context();
    println!("session: {}", describe_session(&context.session()));
    if context.needs_step_up() {
        println!("step-up: required (run `carenotes step-up`)");
    }
    match context.destination() {
        Some(destination) => println!("destination: {destination}"),
        None => println!("destination: none"),
    }

    if let Some(route) = route {
        let route = Route::parse(route);
        println!("{route}: {}", describe_gate(&client.shell().gate(&route)));
    }
    loaded.map(|_| ())
}

/// Refresh on load, then once per stdin line as a focus event.
/// # Errors
/// Returns an error if stdin cannot be read or the state file cannot be written.
pub async fn watch(globals: GlobalArgs) -> Result<()> {
    let client = Client::open(globals)?;
    let result = watch_focus(&client).await;
    client.finish(result)
}

async fn watch_focus(client: &Client) -> Result<()> {
    match client.load().await {
        Ok(report) => println!("load: {}", describe_report(&report)),
        Err(err) => println!("load: {err}"),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match client.shell().refresh().on_focus().await {
                    Ok(report) => println!("focus: {}", describe_report(&report)),
                    Err(err) => println!("focus: {}", err.user_message()),
                }
                let location = line.trim();
                if !location.is_empty() {
                    let route = Route::parse(location);
                    println!("{route}: {}", describe_gate(&client.shell().gate(&route)));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }
    Ok(())
}

fn describe_session(session: &SessionRecord) -> String {
    if !session.logged_in {
        return "signed out".to_string();
    }
    let mfa = if session.mfa_verified {
        "verified"
    } else {
        "pending"
    };
    format!(
        "{} ({}), role {:?}, status {:?}, mfa {mfa}",
        session.username, session.name, session.role, session.status
    )
}

pub(crate) fn describe_report(report: &RefreshReport) -> String {
    match report {
        RefreshReport::Refreshed(RefreshOutcome::Normal) => "session refreshed".to_string(),
        RefreshReport::Refreshed(RefreshOutcome::RequiresPassword) => {
            "session refreshed, password re-proof required".to_string()
        }
        RefreshReport::SignedOut => "session expired, signed out".to_string(),
        RefreshReport::KeptSession => "refresh timed out, keeping the current session".to_string(),
        RefreshReport::Skipped(SkipReason::NoSessionMarker) => "no stored session".to_string(),
        RefreshReport::Skipped(SkipReason::SignedOut) => "skipped, signed out".to_string(),
        RefreshReport::Skipped(SkipReason::Debounced) => "skipped, refreshed recently".to_string(),
        RefreshReport::Skipped(SkipReason::InFlight) => "skipped, refresh in flight".to_string(),
    }
}

pub(crate) fn describe_gate(gate: &Gate) -> String {
    match gate {
        Gate::Loading => "loading".to_string(),
        Gate::RetryableError(message) => format!("error: {message}"),
        Gate::Redirect(route) => format!("redirect to {route}"),
        Gate::StepUp => "covered by the step-up prompt".to_string(),
        Gate::Render => "render".to_string(),
    }
}
