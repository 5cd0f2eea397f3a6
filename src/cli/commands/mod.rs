pub mod logging;
pub mod mfa;
pub mod reset;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_API_URL: &str = "api-url";
pub const ARG_APP_URL: &str = "app-url";
pub const ARG_STATE_FILE: &str = "state-file";
pub const ARG_REQUEST_TIMEOUT: &str = "request-timeout";
pub const ARG_FOCUS_DEBOUNCE: &str = "focus-debounce";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_ROUTE: &str = "route";

pub const DEFAULT_STATE_FILE: &str = ".carenotes-state.json";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("carenotes")
        .about("Session lifecycle and step-up authentication for the Carenotes dashboard")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(ARG_API_URL)
                .short('u')
                .long("api-url")
                .help("Base URL of the session service")
                .env("CARENOTES_API_URL")
                .global(true),
        )
        .arg(
            Arg::new(ARG_APP_URL)
                .long("app-url")
                .help("Dashboard base URL used to print deep links (defaults to the API URL)")
                .env("CARENOTES_APP_URL")
                .global(true),
        )
        .arg(
            Arg::new(ARG_STATE_FILE)
                .long("state-file")
                .help("JSON file holding the session cookies and the pending reset challenge")
                .env("CARENOTES_STATE_FILE")
                .global(true)
                .default_value(DEFAULT_STATE_FILE),
        )
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT)
                .long("request-timeout")
                .help("Request timeout in seconds")
                .env("CARENOTES_REQUEST_TIMEOUT")
                .global(true)
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_FOCUS_DEBOUNCE)
                .long("focus-debounce")
                .help("Minimum seconds between two focus-triggered refreshes")
                .env("CARENOTES_FOCUS_DEBOUNCE")
                .global(true)
                .value_parser(clap::value_parser!(u64)),
        )
        .subcommand(
            Command::new("session")
                .about("Validate the stored session and print where it belongs")
                .arg(
                    Arg::new(ARG_ROUTE)
                        .long("route")
                        .help("Page to evaluate the shell gate for, e.g. /patients/42"),
                ),
        )
        .subcommand(
            Command::new("watch")
                .about("Refresh on load, then treat every stdin line as a window focus event")
                .long_about(
                    "Refresh on load, then treat every stdin line as a window focus event. \
                     A non-empty line is also taken as the current page and its gate is printed.",
                ),
        )
        .subcommand(
            Command::new("step-up")
                .about("Re-prove the session with the account password")
                .arg(
                    Arg::new(ARG_PASSWORD)
                        .long("password")
                        .help("Account password")
                        .env("CARENOTES_PASSWORD")
                        .hide_env_values(true)
                        .required(true),
                ),
        )
        .subcommand(Command::new("sign-out").about("Sign out and forget the stored session"))
        .subcommand(mfa::command())
        .subcommand(reset::command());

    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "carenotes");
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
        let names: Vec<&str> = command.get_subcommands().map(Command::get_name).collect();
        assert_eq!(
            names,
            ["session", "watch", "step-up", "sign-out", "mfa", "reset"]
        );
    }

    #[test]
    fn test_global_args() {
        temp_env::with_vars(
            [
                ("CARENOTES_API_URL", None::<&str>),
                ("CARENOTES_STATE_FILE", None),
            ],
            || {
                let matches = new().get_matches_from([
                    "carenotes",
                    "session",
                    "--api-url",
                    "https://api.carenotes.dev",
                    "--request-timeout",
                    "3",
                ]);
                assert_eq!(
                    matches.get_one::<String>(ARG_API_URL).map(String::as_str),
                    Some("https://api.carenotes.dev")
                );
                assert_eq!(
                    matches.get_one::<String>(ARG_STATE_FILE).map(String::as_str),
                    Some(DEFAULT_STATE_FILE)
                );
                assert_eq!(matches.get_one::<u64>(ARG_REQUEST_TIMEOUT).copied(), Some(3));
                assert_eq!(matches.subcommand_name(), Some("session"));
            },
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("CARENOTES_API_URL", Some("https://api.carenotes.dev")),
                ("CARENOTES_APP_URL", Some("https://app.carenotes.dev")),
                ("CARENOTES_STATE_FILE", Some("/tmp/carenotes.json")),
                ("CARENOTES_FOCUS_DEBOUNCE", Some("60")),
                ("CARENOTES_PASSWORD", Some("Secret123")),
            ],
            || {
                let matches = new().get_matches_from(["carenotes", "step-up"]);
                assert_eq!(
                    matches.get_one::<String>(ARG_APP_URL).map(String::as_str),
                    Some("https://app.carenotes.dev")
                );
                assert_eq!(matches.get_one::<u64>(ARG_FOCUS_DEBOUNCE).copied(), Some(60));
                let step_up = matches.subcommand_matches("step-up").unwrap();
                assert_eq!(
                    step_up.get_one::<String>(ARG_PASSWORD).map(String::as_str),
                    Some("Secret123")
                );
            },
        );
    }
}
