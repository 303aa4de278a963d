//! Tamarisk Thermal Core Protocol
//!
//! Checksum-framed command protocol of the Tamarisk 640 thermal core,
//! carried over the bridge's serial channel.

mod camera;
pub mod commands;
mod error;
pub mod packet;

pub use camera::Tamarisk;
pub use commands::Command;
pub use error::{ErrorStage, ProtocolError};
pub use packet::{checksum, decode, encode, Packet, PacketBuilder};

/// Frame start marker
pub const START_BYTE: u8 = 0x01;

/// Largest payload a frame can carry
pub const MTU: usize = 252;

/// Start marker, id, length and checksum bytes around the payload
pub const FRAME_OVERHEAD: usize = 4;

/// Factory UART rate of the camera
pub const TAMARISK_BAUD_RATE: u32 = 57600;

/// Pause before re-reading a malformed reply, in milliseconds
pub const RETRY_DELAY_MS: u64 = 50;
