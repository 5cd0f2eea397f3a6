use clap::{Arg, Command};

pub const ARG_CODE: &str = "code";

#[must_use]
pub fn command() -> Command {
    Command::new("mfa")
        .about("Second-factor verification for the signed-in session")
        .subcommand_required(true)
        .subcommand(Command::new("send").about("Send a code to the address on file"))
        .subcommand(Command::new("resend").about("Send a new code"))
        .subcommand(
            Command::new("verify").about("Verify the 6-digit code").arg(
                Arg::new(ARG_CODE)
                    .help("Code from the email")
                    .required(true),
            ),
        )
}
