pub mod logging;

use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};
use regex::Regex;

pub const ARG_STORE: &str = "store";
pub const DEFAULT_STORE_PATH: &str = ".petshop-guard.json";

#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[must_use]
pub fn validator_email() -> ValueParser {
    ValueParser::from(move |email: &str| -> std::result::Result<String, String> {
        let email = email.trim();
        if valid_email(email) {
            Ok(email.to_string())
        } else {
            Err("invalid email address".to_string())
        }
    })
}

fn remember() -> Command {
    Command::new("remember")
        .about("Inspect or change the remembered login e-mail")
        .subcommand_required(true)
        .subcommand(Command::new("show").about("Print the saved preference as JSON"))
        .subcommand(
            Command::new("save")
                .about("Remember an e-mail for the next login")
                .arg(
                    Arg::new("email")
                        .help("E-mail to prefill on the login form")
                        .required(true)
                        .value_parser(validator_email()),
                ),
        )
        .subcommand(Command::new("clear").about("Forget the saved e-mail"))
}

fn alerts() -> Command {
    Command::new("alerts")
        .about("Read admin alert inserts as JSON lines from stdin and show them as toasts")
        .arg(
            Arg::new("role")
                .long("role")
                .help("Session role to run as; only admin receives alerts")
                .default_value("admin")
                .env("PETSHOP_ROLE"),
        )
        .arg(
            Arg::new("bell")
                .long("bell")
                .help("Ring the terminal bell for critical and high alerts")
                .action(ArgAction::SetTrue),
        )
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let command = Command::new("petshop-guard")
        .about("Session guards for the pet shop & salon platform")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg(
            Arg::new(ARG_STORE)
                .short('s')
                .long("store")
                .help("Path of the persistent preference store")
                .default_value(DEFAULT_STORE_PATH)
                .env("PETSHOP_STORE_PATH")
                .global(true),
        )
        .subcommand(remember())
        .subcommand(alerts())
        .subcommand(Command::new("config").about("Check the backend configuration"));

    logging::with_args(command)
}
