//! Tamarisk commands
//!
//! Each command is an id plus a small fixed-width payload. The table is
//! data only; the dispatcher treats every command the same way.

use serde::{Deserialize, Serialize};

use super::packet::{Packet, PacketBuilder};
use super::ProtocolError;

/// Calibration id used when the caller does not pick one
pub const DEFAULT_CALIBRATION_ID: u16 = 3;

/// Commands understood by the Tamarisk thermal core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Firmware and system version (0x07)
    GetSystemVersion,
    /// Read the customer non-volatile block (0xCA)
    ReadCustomerNv,
    /// Write the customer non-volatile block (0xCB)
    WriteCustomerNv,
    /// Enable or disable colorization (0xCC)
    SetColorization,
    /// Select a color palette (0xCD)
    SetColorPalette,
    /// Flip/mirror the video output (0xCF)
    SetVideoOrientation,
    /// Select the digital video source (0xD7)
    SetDigitalVideoSource,
    /// Change the camera's UART rate (0xF1). The camera does not answer.
    SetBaudRate,
    /// System status (0xF2)
    GetSystemStatus,
    /// Run a calibration (0x27)
    PerformCalibration,
    /// Enable or disable automatic calibration (0xAC)
    SetAutoCalibration,
}

impl Command {
    /// Every command, in table order
    pub const ALL: [Command; 11] = [
        Command::GetSystemVersion,
        Command::ReadCustomerNv,
        Command::WriteCustomerNv,
        Command::SetColorization,
        Command::SetColorPalette,
        Command::SetVideoOrientation,
        Command::SetDigitalVideoSource,
        Command::SetBaudRate,
        Command::GetSystemStatus,
        Command::PerformCalibration,
        Command::SetAutoCalibration,
    ];

    /// Command id byte
    pub fn id(&self) -> u8 {
        match self {
            Command::GetSystemVersion => 0x07,
            Command::ReadCustomerNv => 0xCA,
            Command::WriteCustomerNv => 0xCB,
            Command::SetColorization => 0xCC,
            Command::SetColorPalette => 0xCD,
            Command::SetVideoOrientation => 0xCF,
            Command::SetDigitalVideoSource => 0xD7,
            Command::SetBaudRate => 0xF1,
            Command::GetSystemStatus => 0xF2,
            Command::PerformCalibration => 0x27,
            Command::SetAutoCalibration => 0xAC,
        }
    }

    /// Name used by operational scripts, e.g. `get_system_version`
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetSystemVersion => "get_system_version",
            Command::ReadCustomerNv => "read_customer_nv",
            Command::WriteCustomerNv => "write_customer_nv",
            Command::SetColorization => "set_colorization",
            Command::SetColorPalette => "set_color_palette",
            Command::SetVideoOrientation => "set_video_orientation",
            Command::SetDigitalVideoSource => "set_digital_video_source",
            Command::SetBaudRate => "set_baudrate",
            Command::GetSystemStatus => "get_system_status",
            Command::PerformCalibration => "perform_calibration",
            Command::SetAutoCalibration => "set_auto_calibration",
        }
    }

    /// Look a command up by its script name
    pub fn from_name(name: &str) -> Option<Command> {
        Self::ALL.iter().copied().find(|cmd| cmd.name() == name)
    }

    /// Check if this command expects a response
    pub fn expects_response(&self) -> bool {
        !matches!(self, Command::SetBaudRate)
    }

    /// Whether the payload is a single big-endian 16-bit parameter
    pub fn takes_word(&self) -> bool {
        !matches!(
            self,
            Command::GetSystemVersion
                | Command::ReadCustomerNv
                | Command::WriteCustomerNv
                | Command::GetSystemStatus
        )
    }

    /// Request without parameters
    pub fn request(&self) -> Result<Packet, ProtocolError> {
        PacketBuilder::new(self.id()).build()
    }

    /// Request carrying one 16-bit parameter
    pub fn request_word(&self, value: u16) -> Result<Packet, ProtocolError> {
        PacketBuilder::new(self.id()).u16_be(value).build()
    }

    /// Request carrying a boolean as 0x0000 / 0x0001
    pub fn request_flag(&self, enable: bool) -> Result<Packet, ProtocolError> {
        self.request_word(u16::from(enable))
    }

    /// Request carrying raw bytes
    pub fn request_bytes(&self, data: &[u8]) -> Result<Packet, ProtocolError> {
        PacketBuilder::new(self.id()).bytes(data).build()
    }

    /// Build a request from raw script parameters
    ///
    /// Word commands read `params` as a big-endian integer (empty = 0, at
    /// most two bytes); the rest pass `params` through unchanged. Flag
    /// commands enable unless `params` is exactly `00 00`, so empty or
    /// one-byte parameters enable.
    pub fn request_from_params(&self, params: &[u8]) -> Result<Packet, ProtocolError> {
        if !self.takes_word() {
            return self.request_bytes(params);
        }
        if params.len() > 2 {
            return Err(ProtocolError::Encode {
                len: params.len(),
                max: 2,
            });
        }
        match self {
            Command::SetColorization | Command::SetAutoCalibration => {
                self.request_flag(params != [0u8, 0])
            }
            _ => {
                let value = params
                    .iter()
                    .fold(0u16, |acc, &b| (acc << 8) | u16::from(b));
                self.request_word(value)
            }
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
