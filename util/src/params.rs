//! Parameter file loading
//!
//! Parameters are TOML files kept in `<sw_root>/params/` and deserialised straight into the
//! caller's parameter struct.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Directory under the software root holding the parameter files.
const PARAMS_DIR: &str = "params";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (BEACON_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot read {0:?}: {1}")]
    FileLoadError(PathBuf, std::io::Error),

    #[error("Invalid parameters: {0}")]
    DeserialiseError(toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load `<sw_root>/params/<relative_path>`.
pub fn load<P: DeserializeOwned>(relative_path: &str) -> Result<P, LoadError> {
    let root = crate::host::get_sw_root().map_err(|_| LoadError::SwRootNotSet)?;

    load_from_path(root.join(PARAMS_DIR).join(relative_path))
}

/// Load a parameter file from anywhere on disk.
pub fn load_from_path<P: DeserializeOwned, F: AsRef<Path>>(path: F) -> Result<P, LoadError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| LoadError::FileLoadError(path.to_path_buf(), e))?;

    from_str(&contents)
}

pub fn from_str<P: DeserializeOwned>(contents: &str) -> Result<P, LoadError> {
    toml::from_str(contents).map_err(LoadError::DeserialiseError)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
