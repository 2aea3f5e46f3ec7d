//! # Session
//!
//! A session is one run of an executable. It fixes the process-wide epoch used to timestamp log
//! lines and owns a fresh directory, `<sw_root>/<sessions_dir>/<exec>_<timestamp>/`, holding the
//! run's log file.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// `strftime` format of the timestamp in session directory names.
const DIR_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Session {
    /// Directory holding everything this run writes
    pub session_root: PathBuf,

    pub log_file_path: PathBuf,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("The software root environment variable (BEACON_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error("A session has already been started in this process ({0})")]
    CannotInitEpoch(conquer_once::TryInitError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start the session, creating its directory under `<sw_root>/<sessions_dir>`.
    ///
    /// Only one session may be started per process.
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        let now = Utc::now();
        SESSION_EPOCH
            .try_init_once(|| now)
            .map_err(SessionError::CannotInitEpoch)?;

        let session_root = crate::host::get_sw_root()
            .map_err(|_| SessionError::SwRootNotSet)?
            .join(sessions_dir)
            .join(format!("{}_{}", exec_name, now.format(DIR_TIMESTAMP_FORMAT)));

        std::fs::create_dir_all(&session_root).map_err(SessionError::CannotCreateDir)?;

        Ok(Session {
            log_file_path: session_root.join(format!("{}.log", exec_name)),
            session_root,
        })
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Seconds since the session started, `NAN` before a session exists.
pub fn get_elapsed_seconds() -> f64 {
    SESSION_EPOCH
        .get()
        .and_then(|e| (Utc::now() - *e).to_std().ok())
        .map_or(std::f64::NAN, |d| d.as_secs_f64())
}

/// Time the session started, `None` before a session exists.
pub fn get_epoch() -> Option<&'static DateTime<Utc>> {
    SESSION_EPOCH.get()
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_no_session() {
        // Tests never start a session, so the epoch is never set
        assert!(get_epoch().is_none());
        assert!(get_elapsed_seconds().is_nan());
    }
}
