//! # Beacon Equipment Communications Module
//!
//! The beacon speaks a deliberately tiny request/response protocol. A request is a fixed size
//! record holding a single command letter and an angle in degrees. The response is either empty
//! (an acknowledgement) or, for a completed obstacle scan only, a packed array of
//! [`DetectedObstacle`] records.
//!
//! Both records use the layout of the equivalent C structs on a little endian target:
//!
//! ```text
//! request:  | letter: u8 | pad: [u8; 3] | angle: f32 |          (8 bytes)
//! obstacle: | x: f32 | y: f32 | height: f32 |                     (12 bytes)
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Size of an encoded [`BeaconCmd`] in bytes.
pub const BEACON_CMD_LEN: usize = 8;

/// Size of one encoded [`DetectedObstacle`] in bytes.
pub const OBSTACLE_RECORD_LEN: usize = 12;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A request sent by the remote client to the beacon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeaconCmd {
    /// The raw command letter, as sent (not yet normalised).
    pub letter: u8,

    /// The angle associated with the command.
    ///
    /// Units: degrees
    pub angle: f32,
}

/// An obstacle found during an obstacle scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedObstacle {
    /// World frame X position of the obstacle.
    ///
    /// Units: centimeters
    pub x: f32,

    /// World frame Y position of the obstacle.
    ///
    /// Units: centimeters
    pub y: f32,

    /// Height of the obstacle relative to the floor, negative for holes.
    ///
    /// Units: centimeters
    pub height: f32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The meaning of a command letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconLetter {
    /// `P`: point the sensor at the given angle
    Point,

    /// `O`: shut the beacon computer down
    TurnOff,

    /// `H`: hard-home the pan stepper, then point at the given angle
    HardHome,

    /// `T`: point at the given angle and run an obstacle scan there
    Scan,

    /// Any other letter, stored after normalisation to uppercase
    Unknown(u8),
}

/// How an obstacle affects the robot's ability to drive over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObstacleClass {
    /// Low enough for the robot to straddle
    Straddleable,

    /// Must be driven around
    Impassable,
}

/// Errors that can occur while decoding wire records.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    #[error("Expected a record of {expected} bytes, got {found}")]
    BadLength { expected: usize, found: usize },

    #[error("Obstacle list length {0} is not a whole number of records")]
    PartialRecord(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BeaconCmd {
    pub fn new(letter: char, angle: f32) -> Self {
        Self {
            letter: letter as u8,
            angle,
        }
    }

    /// The normalised meaning of this command's letter.
    pub fn kind(&self) -> BeaconLetter {
        BeaconLetter::from_byte(self.letter)
    }

    /// Encode into the fixed size wire record.
    pub fn to_bytes(&self) -> [u8; BEACON_CMD_LEN] {
        let mut buf = [0u8; BEACON_CMD_LEN];
        buf[0] = self.letter;
        LittleEndian::write_f32(&mut buf[4..8], self.angle);
        buf
    }

    /// Decode from the fixed size wire record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() != BEACON_CMD_LEN {
            return Err(WireError::BadLength {
                expected: BEACON_CMD_LEN,
                found: bytes.len(),
            });
        }

        Ok(Self {
            letter: bytes[0],
            angle: LittleEndian::read_f32(&bytes[4..8]),
        })
    }
}

impl BeaconLetter {
    /// Parse a letter byte, case-insensitively.
    pub fn from_byte(letter: u8) -> Self {
        match letter.to_ascii_uppercase() {
            b'P' => BeaconLetter::Point,
            b'O' => BeaconLetter::TurnOff,
            b'H' => BeaconLetter::HardHome,
            b'T' => BeaconLetter::Scan,
            other => BeaconLetter::Unknown(other),
        }
    }
}

impl DetectedObstacle {
    /// Severity of the obstacle, the magnitude of its height normalised by `scale_cm`.
    pub fn severity(&self, scale_cm: f32) -> f32 {
        self.height.abs() / scale_cm
    }

    /// Classify the obstacle, anything with a severity of one or more is impassable.
    pub fn class(&self, scale_cm: f32) -> ObstacleClass {
        if self.severity(scale_cm) >= 1.0 {
            ObstacleClass::Impassable
        } else {
            ObstacleClass::Straddleable
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Pack a list of obstacles into a scan response payload.
pub fn encode_obstacles(obstacles: &[DetectedObstacle]) -> Vec<u8> {
    let mut buf = vec![0u8; obstacles.len() * OBSTACLE_RECORD_LEN];

    for (o, chunk) in obstacles.iter().zip(buf.chunks_exact_mut(OBSTACLE_RECORD_LEN)) {
        LittleEndian::write_f32_into(&[o.x, o.y, o.height], chunk);
    }

    buf
}

/// Unpack a scan response payload. An empty payload is an empty list.
pub fn decode_obstacles(bytes: &[u8]) -> Result<Vec<DetectedObstacle>, WireError> {
    if bytes.len() % OBSTACLE_RECORD_LEN != 0 {
        return Err(WireError::PartialRecord(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(OBSTACLE_RECORD_LEN)
        .map(|chunk| {
            let mut vals = [0f32; 3];
            LittleEndian::read_f32_into(chunk, &mut vals);
            DetectedObstacle {
                x: vals[0],
                y: vals[1],
                height: vals[2],
            }
        })
        .collect())
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cmd_layout() {
        let bytes = BeaconCmd::new('t', -45.5).to_bytes();

        assert_eq!(bytes[0], b't');
        assert_eq!(&bytes[1..4], &[0, 0, 0]);
        assert_eq!(&bytes[4..8], &(-45.5f32).to_le_bytes());

        let cmd = BeaconCmd::from_bytes(&bytes).unwrap();
        assert_eq!(cmd.kind(), BeaconLetter::Scan);
        assert_eq!(cmd.angle, -45.5);
    }

    #[test]
    fn test_cmd_bad_length() {
        assert_eq!(
            BeaconCmd::from_bytes(&[b'P', 0, 0]),
            Err(WireError::BadLength { expected: 8, found: 3 })
        );
    }

    #[test]
    fn test_letters() {
        assert_eq!(BeaconLetter::from_byte(b'p'), BeaconLetter::Point);
        assert_eq!(BeaconLetter::from_byte(b'O'), BeaconLetter::TurnOff);
        assert_eq!(BeaconLetter::from_byte(b'h'), BeaconLetter::HardHome);
        assert_eq!(BeaconLetter::from_byte(b'z'), BeaconLetter::Unknown(b'Z'));
    }

    #[test]
    fn test_obstacle_payload() {
        assert_eq!(decode_obstacles(&[]).unwrap(), vec![]);
        assert_eq!(decode_obstacles(&[0u8; 13]), Err(WireError::PartialRecord(13)));

        let obs = vec![
            DetectedObstacle { x: 120.0, y: 300.5, height: 32.0 },
            DetectedObstacle { x: -20.0, y: 80.0, height: -12.0 },
        ];
        let bytes = encode_obstacles(&obs);
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[8..12], &32f32.to_le_bytes());
        assert_eq!(decode_obstacles(&bytes).unwrap(), obs);
    }

    #[test]
    fn test_obstacle_class() {
        let tall = DetectedObstacle { x: 0.0, y: 0.0, height: 30.0 };
        let hole = DetectedObstacle { x: 0.0, y: 0.0, height: -12.5 };

        assert_eq!(tall.class(25.0), ObstacleClass::Impassable);
        assert_eq!(hole.class(25.0), ObstacleClass::Straddleable);
        assert!((hole.severity(25.0) - 0.5).abs() < 1e-6);
    }
}
