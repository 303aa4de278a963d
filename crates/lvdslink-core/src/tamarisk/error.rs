//! Protocol errors

use thiserror::Error;

use crate::bridge::TransportError;

/// Which stage of a command round trip failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    /// The bridge could not be reached; the device may be absent
    Transport,
    /// The request could not be framed
    Encode,
    /// The camera stayed silent
    Response,
    /// The camera answered with a malformed frame
    Framing,
}

/// Errors that can occur while talking to a Tamarisk core
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("No response to command {id:#04x}")]
    NoResponse { id: u8 },

    #[error("Malformed frame: {raw:02x?}")]
    Format { raw: Vec<u8> },

    #[error("Length mismatch: header declares {declared} payload bytes, frame carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },

    #[error("Cannot frame {len} bytes: limit is {max}")]
    Encode { len: usize, max: usize },
}

impl ProtocolError {
    pub fn stage(&self) -> ErrorStage {
        match self {
            ProtocolError::Transport(_) => ErrorStage::Transport,
            ProtocolError::Encode { .. } => ErrorStage::Encode,
            ProtocolError::NoResponse { .. } => ErrorStage::Response,
            ProtocolError::Format { .. }
            | ProtocolError::LengthMismatch { .. }
            | ProtocolError::Checksum { .. } => ErrorStage::Framing,
        }
    }

    /// Malformed reply, eligible for the single re-read
    pub fn is_framing(&self) -> bool {
        self.stage() == ErrorStage::Framing
    }
}
