use clap::{builder::ValueParser, Arg, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accept a level name or its index, as `FRONTDOOR_LOG_LEVEL=debug` or `=3`.
fn parse_level(level: &str) -> Result<u8, String> {
    let level = level.trim().to_ascii_lowercase();
    let index = match level.parse::<usize>() {
        // `-v` counts arrive here too, so extra flags saturate at trace
        Ok(number) => Some(number.min(LEVEL_NAMES.len() - 1)),
        Err(_) => LEVEL_NAMES.iter().position(|name| *name == level),
    };
    index
        .filter(|index| *index < LEVEL_NAMES.len())
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("invalid log level {level:?}, expected one of {LEVEL_NAMES:?}"))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("FRONTDOOR_LOG_LEVEL")
            .global(true)
            .action(clap::ArgAction::Count)
            .value_parser(ValueParser::from(parse_level)),
    )
}
