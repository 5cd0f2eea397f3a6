use clap::{Arg, Command};

pub const ARG_EMAIL: &str = "email";
pub const ARG_CODE: &str = "code";
pub const ARG_TOKEN: &str = "token";
pub const ARG_NEW_PASSWORD: &str = "password";
pub const ARG_CONFIRM: &str = "confirm";
pub const ARG_URL: &str = "url";

#[must_use]
pub fn command() -> Command {
    Command::new("reset")
        .about("Password recovery")
        .subcommand_required(true)
        .subcommand(
            Command::new("start")
                .about("Request a recovery code")
                .arg(Arg::new(ARG_EMAIL).help("Account email address").required(true)),
        )
        .subcommand(
            Command::new("verify")
                .about("Verify the recovery code and print the reset link")
                .arg(Arg::new(ARG_CODE).help("Code from the email").required(true)),
        )
        .subcommand(Command::new("resend").about("Request a new recovery code"))
        .subcommand(
            Command::new("change")
                .about("Set a new password with a reset token")
                .arg(
                    Arg::new(ARG_TOKEN)
                        .long("token")
                        .help("Reset token from the reset link")
                        .env("CARENOTES_RESET_TOKEN")
                        .hide_env_values(true)
                        .required(true),
                )
                .arg(
                    Arg::new(ARG_NEW_PASSWORD)
                        .long("password")
                        .help("New password")
                        .env("CARENOTES_NEW_PASSWORD")
                        .hide_env_values(true)
                        .required(true),
                )
                .arg(
                    Arg::new(ARG_CONFIRM)
                        .long("confirm")
                        .help("New password, again")
                        .env("CARENOTES_CONFIRM_PASSWORD")
                        .hide_env_values(true)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("link")
                .about("Show where a reset link lands")
                .arg(Arg::new(ARG_URL).help("Reset link or path").required(true)),
        )
        .subcommand(Command::new("cancel").about("Forget the pending recovery"))
}
