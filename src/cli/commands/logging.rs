use crate::cli::telemetry::LogFormat;
use clap::{
    builder::{PossibleValuesParser, ValueParser},
    Arg, Command,
};

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_LOG_FORMAT: &str = "log-format";

/// Accepts a level name or a number (0 = error .. 4 = trace) from `PETSHOP_LOG_LEVEL`.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level, expected error|warn|info|debug|trace".to_string()),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Log more to stderr; repeat for warn, info, debug, trace (default: errors only)")
                .env("PETSHOP_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .arg(
            Arg::new(ARG_LOG_FORMAT)
                .long("log-format")
                .help("Shape of the stderr log lines; json suits `alerts` running under a supervisor")
                .env("PETSHOP_LOG_FORMAT")
                .default_value("pretty")
                .global(true)
                .value_parser(PossibleValuesParser::new(LogFormat::VALUES)),
        )
}
