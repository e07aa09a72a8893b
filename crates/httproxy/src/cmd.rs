//! Command-line flags. The proxy's bind address and most tuning knobs live
//! in the JSON config file (see [`crate::config`]); the flags here are
//! strictly about how the process starts up and how it logs.

use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use sarge::{prelude::*, ArgumentType};

sarge! {
    #[derive(Debug)]
    pub Args,

    /// log level: off, error, warn, info, debug, trace (or repeated 'v' for verbosity)
    #ok 'v' @HTTPROXY_LOG_LEVEL pub log_level: LogLevel = LogLevel("info".into()),

    /// log with ANSI color on stdout (the log file is always uncolored)
    #ok pub colored: bool = false,

    /// help
    #ok 'h' pub help: bool = false,
}

#[derive(Debug)]
pub struct LogLevel(String);

impl FromStr for LogLevel {
    type Err = core::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(String::from_str(s)?))
    }
}

impl ArgumentType for LogLevel {
    type Error = ArgParseError;
    fn from_value(val: Option<&str>) -> sarge::ArgResult<Self> {
        Ok(LogLevel(normalize_level(val).to_string())).into()
    }
}

/// Maps a `-v`/`--log-level` value to a level name `logging::init` accepts.
/// A named level (`warn`, `error`, ...) normalises to its canonical spelling;
/// anything else is read as a count of repeated `v`s (`-vvv` = trace).
fn normalize_level(val: Option<&str>) -> &'static str {
    const VERBOSE_PAT: char = 'v';

    let Some(v) = val else {
        return "info";
    };
    match v.trim().to_ascii_lowercase().as_str() {
        "off" => "off",
        "err" | "error" => "error",
        "warn" | "warning" => "warn",
        "info" => "info",
        "debug" => "debug",
        "trace" => "trace",
        s => {
            let count = s.chars().filter(|c| c.eq_ignore_ascii_case(&VERBOSE_PAT)).count();
            match count {
                0 => "off",
                1 => "info",
                2 => "debug",
                3 => "trace",
                _ => "trace",
            }
        }
    }
}

impl Deref for LogLevel {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl DerefMut for LogLevel {
    fn deref_mut(&mut self) -> &mut str {
        &mut self.0
    }
}
