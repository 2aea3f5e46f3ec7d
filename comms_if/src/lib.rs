//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the beacon software: the network sockets
//! and the wire records exchanged with the remote (robot-side) client.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Request and response definitions for equipment (like the beacon)
pub mod eqpt;

/// Network module
pub mod net;
