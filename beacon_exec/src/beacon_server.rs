//! # Beacon Server Module
//!
//! Receives commands from the remote client and sends back their replies. The server is a zmq REP
//! socket, so every request must be answered exactly once before the next can be read. Scan
//! requests are answered several cycles after they arrive, while the reply is owed no new request
//! is read.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::beacon::{BeaconCmd, WireError},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};
use log::trace;

use crate::params::NetParams;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of remote commands.
pub trait CommandChannel {
    /// Get the next request without blocking.
    ///
    /// Returns `Ok(None)` if nothing is waiting or if the previous request has not been replied
    /// to yet. If an error is returned after a message was received the request is still owed a
    /// reply.
    fn request(&mut self) -> Result<Option<BeaconCmd>, BeaconServerError>;

    /// Reply to the outstanding request. An empty payload is a plain acknowledgement.
    fn respond(&mut self, payload: &[u8]) -> Result<(), BeaconServerError>;

    /// If a request has been received but not yet replied to.
    fn reply_owed(&self) -> bool;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The networking part of the beacon executable.
pub struct BeaconServer {
    /// REP socket the client sends commands to
    socket: MonitoredSocket,

    reply_owed: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum BeaconServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not receive a request: {0}")]
    RecvError(zmq::Error),

    #[error("Could not decode the request: {0}")]
    DecodeError(WireError),

    #[error("Could not send the reply: {0}")]
    SendError(zmq::Error),

    #[error("Attempted to reply but no request is pending")]
    NoRequestPending,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BeaconServer {
    /// Create the server, binding to the command endpoint.
    ///
    /// This function will not wait for a client to connect before returning.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, BeaconServerError> {
        let socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            linger: 0,
            send_timeout: 100,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(
            ctx,
            zmq::REP,
            socket_options,
            &params.command_endpoint,
        )?;

        Ok(Self {
            socket,
            reply_owed: false,
        })
    }

    /// If a client is connected.
    pub fn connected(&self) -> bool {
        self.socket.connected()
    }
}

impl CommandChannel for BeaconServer {
    fn request(&mut self) -> Result<Option<BeaconCmd>, BeaconServerError> {
        if self.reply_owed {
            return Ok(None);
        }

        let bytes = match self
            .socket
            .try_recv_bytes()
            .map_err(BeaconServerError::RecvError)?
        {
            Some(b) => b,
            None => return Ok(None),
        };

        self.reply_owed = true;
        trace!("Received {} byte request", bytes.len());

        BeaconCmd::from_bytes(&bytes)
            .map(Some)
            .map_err(BeaconServerError::DecodeError)
    }

    fn respond(&mut self, payload: &[u8]) -> Result<(), BeaconServerError> {
        if !self.reply_owed {
            return Err(BeaconServerError::NoRequestPending);
        }

        self.socket
            .send(payload, 0)
            .map_err(BeaconServerError::SendError)?;
        self.reply_owed = false;

        trace!("Sent {} byte reply", payload.len());

        Ok(())
    }

    fn reply_owed(&self) -> bool {
        self.reply_owed
    }
}

impl From<MonitoredSocketError> for BeaconServerError {
    fn from(e: MonitoredSocketError) -> Self {
        BeaconServerError::SocketError(e)
    }
}
