//! Shared support code for the beacon executables

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Host information and the software root
pub mod host;

/// Stdout and file logging
pub mod logger;

pub mod maths;

/// TOML parameter file loading
pub mod params;

/// Per-run session directory and epoch
pub mod session;
