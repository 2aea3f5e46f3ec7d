//! [`StepperLink`] implementation over a USB serial port.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::info;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

use super::{StepperError, StepperLink};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Read/write timeout of the port. Reads are only made once bytes are waiting so this only bounds
/// a misbehaving board.
const PORT_TIMEOUT_MS: u64 = 10;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Serial connection to the stepper board.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SerialLink {
    /// Open the port at `path`, 8N1 with no flow control.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, StepperError> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(PORT_TIMEOUT_MS))
            .open()
            .map_err(StepperError::OpenError)?;

        info!("Opened stepper port {} at {} baud", path, baud_rate);

        Ok(Self { port })
    }
}

impl StepperLink for SerialLink {
    fn available(&mut self) -> Result<usize, StepperError> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(StepperError::LinkError)
    }

    fn read_byte(&mut self) -> Result<u8, StepperError> {
        let mut buf = [0u8; 1];
        self.port
            .read_exact(&mut buf)
            .map_err(StepperError::IoError)?;
        Ok(buf[0])
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), StepperError> {
        self.port.write_all(&[byte]).map_err(StepperError::IoError)?;
        self.port.flush().map_err(StepperError::IoError)
    }
}
