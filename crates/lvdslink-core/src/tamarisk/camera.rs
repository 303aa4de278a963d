//! Tamarisk command dispatcher
//!
//! Round trips checksum-framed commands over any [`Transceiver`].

use std::time::Duration;

use super::commands::{Command, DEFAULT_CALIBRATION_ID};
use super::packet::Packet;
use super::{ProtocolError, RETRY_DELAY_MS};
use crate::bridge::{ControlChannel, DeviceNode, LvdsSerial, Reply, Transceiver, TransportError};
use crate::config::BridgeConfig;

/// Tamarisk thermal core reachable over a bridge channel
#[derive(Debug)]
pub struct Tamarisk<T: Transceiver> {
    transport: T,
    retry_delay: Duration,
}

impl Tamarisk<LvdsSerial<DeviceNode>> {
    /// Open the bridge named in `config` and talk to the camera behind it
    pub fn open(config: &BridgeConfig) -> Result<Self, ProtocolError> {
        Ok(Self::new(LvdsSerial::open(config)?))
    }
}

impl<C: ControlChannel> Tamarisk<LvdsSerial<C>> {
    /// Re-create the bridge channel with `config`
    ///
    /// [`set_baud_rate`](Self::set_baud_rate) only reconfigures the camera;
    /// call this with the matching bridge rate to keep talking to it. The
    /// channel itself is reused, so `config.device_path` must name the same
    /// device; switching devices is a `Config` error.
    pub fn reconnect(self, config: &BridgeConfig) -> Result<Self, ProtocolError> {
        if config.device_path.as_path() != self.transport.device_path() {
            return Err(TransportError::Config(format!(
                "cannot reconnect {} as {}",
                self.transport.device_path().display(),
                config.device_path.display()
            ))
            .into());
        }
        let retry_delay = self.retry_delay;
        let serial = LvdsSerial::new(self.transport.into_inner(), config)?;
        Ok(Self {
            transport: serial,
            retry_delay,
        })
    }
}

impl<T: Transceiver> Tamarisk<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }

    /// Pause before the single re-read of a malformed reply
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Send one command frame and, if asked to, return the camera's reply
    ///
    /// With `expect_response == false` the frame is only sent; nothing is
    /// read and `Ok(None)` is returned.
    pub fn command(
        &self,
        id: u8,
        payload: &[u8],
        expect_response: bool,
    ) -> Result<Option<Packet>, ProtocolError> {
        let packet = Packet::new(id, payload.to_vec())?;
        self.send_packet(&packet, expect_response)
    }

    /// [`command`](Self::command) for an already built packet
    pub fn send_packet(
        &self,
        packet: &Packet,
        expect_response: bool,
    ) -> Result<Option<Packet>, ProtocolError> {
        let frame = packet.to_bytes();
        let max = self.transport.max_transfer();
        if frame.len() > max {
            return Err(ProtocolError::Encode {
                len: frame.len(),
                max,
            });
        }

        if !expect_response {
            tracing::debug!("command {:#04x}: sending without waiting for a reply", packet.id());
            self.transport.send(&frame)?;
            return Ok(None);
        }

        let reply = self.transport.transact_validated(&frame, self.retry_delay, &|raw| {
            Packet::from_bytes(raw).is_ok()
        })?;
        if reply.first.is_empty() {
            return Err(ProtocolError::NoResponse { id: packet.id() });
        }
        Self::decode_reply(packet.id(), reply).map(Some)
    }

    /// Decode a reply, falling back on the bytes from the single re-read
    fn decode_reply(id: u8, reply: Reply) -> Result<Packet, ProtocolError> {
        let Reply { first, late } = reply;
        let err = match Packet::from_bytes(&first) {
            Ok(packet) => return Ok(packet),
            Err(err) => err,
        };
        if late.is_empty() {
            tracing::debug!("command {:#04x}: {}, nothing more arrived", id, err);
            return Err(err);
        }

        // The tail of a reply may land after the first read.
        let mut joined = first;
        joined.extend_from_slice(&late);
        Packet::from_bytes(&joined)
            .or_else(|_| Packet::from_bytes(&late))
            .map_err(|_| {
                tracing::warn!("command {:#04x}: reply still malformed after re-read", id);
                err
            })
    }

    /// Dispatch `cmd` with raw script parameters
    pub fn execute(&self, cmd: Command, params: &[u8]) -> Result<Option<Packet>, ProtocolError> {
        let packet = cmd.request_from_params(params)?;
        self.send_packet(&packet, cmd.expects_response())
    }

    fn round_trip(&self, cmd: Command, packet: Packet) -> Result<Packet, ProtocolError> {
        self.send_packet(&packet, true)?
            .ok_or(ProtocolError::NoResponse { id: cmd.id() })
    }

    pub fn get_system_version(&self) -> Result<Packet, ProtocolError> {
        let cmd = Command::GetSystemVersion;
        self.round_trip(cmd, cmd.request()?)
    }

    pub fn read_customer_nv(&self) -> Result<Packet, ProtocolError> {
        let cmd = Command::ReadCustomerNv;
        self.round_trip(cmd, cmd.request()?)
    }

    pub fn write_customer_nv(&self, data: &[u8]) -> Result<Packet, ProtocolError> {
        let cmd = Command::WriteCustomerNv;
        self.round_trip(cmd, cmd.request_bytes(data)?)
    }

    pub fn set_colorization(&self, enable: bool) -> Result<Packet, ProtocolError> {
        let cmd = Command::SetColorization;
        self.round_trip(cmd, cmd.request_flag(enable)?)
    }

    pub fn set_color_palette(&self, palette_id: u16) -> Result<Packet, ProtocolError> {
        let cmd = Command::SetColorPalette;
        self.round_trip(cmd, cmd.request_word(palette_id)?)
    }

    pub fn set_video_orientation(&self, orientation: u16) -> Result<Packet, ProtocolError> {
        let cmd = Command::SetVideoOrientation;
        self.round_trip(cmd, cmd.request_word(orientation)?)
    }

    pub fn set_digital_video_source(&self, source_id: u16) -> Result<Packet, ProtocolError> {
        let cmd = Command::SetDigitalVideoSource;
        self.round_trip(cmd, cmd.request_word(source_id)?)
    }

    /// Switch the camera's UART to another rate
    ///
    /// The bridge keeps its own rate; follow up with
    /// [`reconnect`](Tamarisk::reconnect) at the matching baud.
    pub fn set_baud_rate(&self, baud_id: u16) -> Result<(), ProtocolError> {
        let cmd = Command::SetBaudRate;
        self.send_packet(&cmd.request_word(baud_id)?, false)?;
        Ok(())
    }

    pub fn get_system_status(&self) -> Result<Packet, ProtocolError> {
        let cmd = Command::GetSystemStatus;
        self.round_trip(cmd, cmd.request()?)
    }

    /// Run calibration `cal_id` (the camera's default is 3)
    pub fn perform_calibration(&self, cal_id: Option<u16>) -> Result<Packet, ProtocolError> {
        let cmd = Command::PerformCalibration;
        self.round_trip(
            cmd,
            cmd.request_word(cal_id.unwrap_or(DEFAULT_CALIBRATION_ID))?,
        )
    }

    pub fn set_auto_calibration(&self, enable: bool) -> Result<Packet, ProtocolError> {
        let cmd = Command::SetAutoCalibration;
        self.round_trip(cmd, cmd.request_flag(enable)?)
    }
}
