//! # Pose Server Module
//!
//! Publishes the fused robot pose of every frame on a zmq PUB socket, serialised as JSON.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions};

use crate::{loc::RobotMarkersAll, params::NetParams};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Destination for the fused pose stream.
pub trait PosePublisher {
    fn publish(&mut self, markers: &RobotMarkersAll) -> Result<(), PosePubError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct PoseServer {
    /// PUB socket the pose is sent on
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum PosePubError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not serialise the pose: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not send the pose: {0}")]
    SendError(zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PoseServer {
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, PosePubError> {
        let socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            linger: 0,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::PUB, socket_options, &params.pose_endpoint)
            .map_err(PosePubError::SocketError)?;

        Ok(Self { socket })
    }
}

impl PosePublisher for PoseServer {
    fn publish(&mut self, markers: &RobotMarkersAll) -> Result<(), PosePubError> {
        let s = serde_json::to_string(markers).map_err(PosePubError::SerializationError)?;

        self.socket
            .send(&s, zmq::DONTWAIT)
            .map_err(PosePubError::SendError)
    }
}
