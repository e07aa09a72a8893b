//! Process-wide logger setup: stdout plus the event-sink log file, both
//! rendered in the canonical `TIMESTAMP - LEVEL - message` form that
//! downstream tooling parses ALLOWED/BLOCKED lines out of.

use std::str::FromStr;

use anyhow::Result;
use fern::colors::{Color, ColoredLevelConfig};

/// Installs the logger. The file sink always uses the canonical,
/// uncolored level words (`INFO`, `WARNING`, `ERROR`, ...) regardless of
/// `colored` — that flag only affects the stdout chain, and trades the
/// exact `WARNING` wording for fern's shorter ANSI-highlighted level name,
/// which is fine for an interactive terminal but not for anything parsing
/// the log file.
pub fn init(log_level: &str, log_file: &str, colored: bool) -> Result<()> {
    if let Some(parent) = std::path::Path::new(log_file).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let level = log::LevelFilter::from_str(log_level)?;

    let colors = ColoredLevelConfig::new()
        .trace(Color::Magenta)
        .debug(Color::Blue)
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red);

    let file_sink = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                level_word(record.level()),
                message
            ))
        })
        .chain(fern::log_file(log_file)?);

    let console_sink = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                if colored {
                    colors.color(record.level()).to_string()
                } else {
                    level_word(record.level()).to_string()
                },
                message
            ))
        })
        .chain(std::io::stdout());

    fern::Dispatch::new()
        .level(level)
        .chain(file_sink)
        .chain(console_sink)
        .apply()?;
    Ok(())
}

/// Matches the canonical `WARNING` wording this crate's log format
/// specifies, rather than fern's default `WARN`.
fn level_word(level: log::Level) -> &'static str {
    match level {
        log::Level::Warn => "WARNING",
        log::Level::Error => "ERROR",
        log::Level::Info => "INFO",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warn_renders_as_full_word() {
        assert_eq!(level_word(log::Level::Warn), "WARNING");
        assert_eq!(level_word(log::Level::Error), "ERROR");
        assert_eq!(level_word(log::Level::Info), "INFO");
    }
}
