//! Bridge diagnostics
//!
//! Read-only queries about the LVDS link plus the register-block and power
//! controls. None of these touch the UART FIFOs, so they run without the
//! transaction lock.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ioctl::{ControlChannel, ControlRequest, IoctlSerial};
use super::{LvdsSerial, LvdsStatus, TransportError};

/// Video timing measured by the bridge on its LVDS input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoTiming {
    /// Active pixels per line
    pub width: u32,
    /// Active lines per frame
    pub height: u32,
    /// Frame period in microseconds
    pub frame_period_us: u32,
}

impl VideoTiming {
    /// Frames per second, or `None` while no frames are being measured
    pub fn frame_rate(&self) -> Option<f64> {
        if self.frame_period_us == 0 {
            None
        } else {
            Some(1_000_000.0 / self.frame_period_us as f64)
        }
    }
}

impl fmt::Display for VideoTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frame_rate() {
            Some(rate) => write!(f, "{} x {} @ {:.1}", self.width, self.height, rate),
            None => write!(f, "{} x {} @ -", self.width, self.height),
        }
    }
}

impl<C: ControlChannel> LvdsSerial<C> {
    /// Bitstream version reported by the FPGA
    pub fn firmware_version(&self) -> Result<u32, TransportError> {
        Ok(self.query(ControlRequest::GetFwVersion, 0)?.len)
    }

    pub fn lvds_status(&self) -> Result<LvdsStatus, TransportError> {
        Ok(LvdsStatus::from_word(
            self.query(ControlRequest::GetLvdsStatus, 0)?.len,
        ))
    }

    /// Line/column counts and frame period of the incoming video
    pub fn video_timing(&self) -> Result<VideoTiming, TransportError> {
        let height = self.query(ControlRequest::GetLineCount, 0)?.len;
        let width = self.query(ControlRequest::GetColumnCount, 0)?.len;
        let frame_period_us = self.query(ControlRequest::GetFramePeriod, 0)?.len;
        let timing = VideoTiming {
            width,
            height,
            frame_period_us,
        };
        tracing::debug!("video timing: {}", timing);
        Ok(timing)
    }

    pub fn pixel_frequency(&self) -> Result<u32, TransportError> {
        Ok(self.query(ControlRequest::GetPixelFreq, 0)?.len)
    }

    pub fn set_powerdown(&self, powerdown: bool) -> Result<(), TransportError> {
        self.query(ControlRequest::SetPowerdown, u32::from(powerdown))?;
        Ok(())
    }

    /// Force inversion of the HSYNC/VSYNC polarity
    pub fn force_hvsync_inversion(&self, invert: bool) -> Result<(), TransportError> {
        self.query(ControlRequest::ForceHvsyncInv, u32::from(invert))?;
        Ok(())
    }

    /// Read a block of `count` bridge register bytes
    pub fn read_registers(&self, count: usize) -> Result<Vec<u8>, TransportError> {
        let max = self.channel().max_transfer();
        if count > max {
            return Err(TransportError::MessageTooLarge { len: count, max });
        }
        let arg = self.query(ControlRequest::GetRegs, count as u32)?;
        Ok(arg.payload().to_vec())
    }

    /// Write a block of bridge register bytes
    pub fn write_registers(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut arg = IoctlSerial::with_data(bytes)?;
        self.channel().call(ControlRequest::SetRegs, &mut arg)
    }
}
