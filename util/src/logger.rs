//! # Logger
//!
//! Sends log records to stdout and to the session's log file. Every line is stamped with the
//! seconds elapsed since the session started and a short coloured level tag. Debug and trace lines
//! also name the module they came from.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use colored::{ColoredString, Colorize};
use log::{info, Level, Record};
use thiserror::Error;

use crate::session::{self, Session};

pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The minimum log level must be Info or more verbose, found {0}")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Could not open the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("Could not install the logger: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Install the logger. May only be called once per process.
///
/// `min_level` must let at least `Info` records through, the executables rely on startup
/// information always reaching the log file.
pub fn logger_init(min_level: LevelFilter, session: &Session) -> Result<(), LoggerInitError> {
    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level));
    }

    let log_file =
        fern::log_file(&session.log_file_path).map_err(LoggerInitError::LogFileInitError)?;

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{:10.6} {}] {}{}",
                session::get_elapsed_seconds(),
                level_tag(record.level()),
                target_prefix(record),
                message
            ))
        })
        .level(min_level)
        // zmq's internals are very chatty at debug
        .level_for("zmq", LevelFilter::Info)
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging to {:?} at {:?}", session.log_file_path, min_level);
    if let Some(epoch) = session::get_epoch() {
        info!("Session started {}", epoch);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Error => "ERR".red().bold(),
        Level::Warn => "WRN".yellow(),
        Level::Info => "INF".normal(),
        Level::Debug => "DBG".dimmed(),
        Level::Trace => "TRC".dimmed().italic(),
    }
}

/// `"target: "` for debug and trace records, empty otherwise.
fn target_prefix(record: &Record) -> String {
    if record.level() > Level::Info {
        format!("{}: ", record.target())
    } else {
        String::new()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_target_prefix() {
        let info = Record::builder()
            .level(Level::Info)
            .target("beacon_lib::acq")
            .build();
        let debug = Record::builder()
            .level(Level::Debug)
            .target("beacon_lib::acq")
            .build();

        assert_eq!(target_prefix(&info), "");
        assert_eq!(target_prefix(&debug), "beacon_lib::acq: ");
    }
}
