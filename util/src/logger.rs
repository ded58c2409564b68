//! # Logger
//!
//! All executables log through the `log` facade. This module installs the `fern` dispatch which
//! writes each record to stdout and to the session's log file, prefixed with the number of seconds
//! elapsed since the session epoch.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use colored::{ColoredString, Colorize};
use log::{self, info};
use thiserror::Error;

use crate::session;

pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// # Notes
///
/// - `min_level` must be `Info` or more verbose, so that state changes are never hidden.
/// - Must only be called once per process, `fern` refuses a second logger.
pub fn logger_init(
    min_level: LevelFilter,
    session: &session::Session,
) -> Result<(), LoggerInitError> {
    if min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level));
    }

    let log_file =
        fern::log_file(&session.log_file_path).map_err(LoggerInitError::LogFileInitError)?;

    fern::Dispatch::new()
        .format(|out, message, record| {
            let elapsed = session::get_elapsed_seconds();
            let level = level_to_str(record.level());

            // Only debug and trace records carry their target
            if record.level() > log::Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {}] {}: {}",
                    elapsed,
                    level,
                    record.target(),
                    message
                ))
            } else {
                out.finish(format_args!("[{:10.6} {}] {}", elapsed, level, message))
            }
        })
        .level(min_level)
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info => "INF".normal(),
        log::Level::Warn => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold(),
    }
}
