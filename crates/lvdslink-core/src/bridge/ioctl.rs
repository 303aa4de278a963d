//! Control-channel access to the bridge driver
//!
//! The LVDS2MIPI driver exposes its emulated UART and diagnostic registers
//! through ioctls on the sub-device node. Every request carries the same
//! argument: a 32-bit length followed by a 64-byte data buffer.

use std::fs::File;
use std::path::{Path, PathBuf};

use super::TransportError;

/// Size of the data buffer carried by every control call
pub const SERIAL_DATA_LEN: usize = 64;

/// Control requests understood by the bridge driver
///
/// The codes are raw request numbers, not `_IOC`-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ControlRequest {
    /// Queue `len` bytes of `data` on the UART transmitter
    SerialSendTx = 0x7601,
    /// Drain up to `len` bytes (0 = all) from the receive FIFO
    SerialRecvRx = 0x7602,
    /// Number of bytes waiting in the receive FIFO
    SerialRxCount = 0x7603,
    /// Set the baud rate (`len` != 0) or read it back (`len` == 0)
    SerialBaud = 0x7604,
    GetFwVersion = 0x7605,
    GetLvdsStatus = 0x7606,
    GetUartStatus = 0x7607,
    /// Measured frame period in microseconds
    GetFramePeriod = 0x7608,
    GetPixelFreq = 0x7609,
    GetLineCount = 0x760A,
    GetColumnCount = 0x760B,
    SetPowerdown = 0x760C,
    ForceHvsyncInv = 0x760D,
    GetRegs = 0x760E,
    SetRegs = 0x760F,
    /// Last byte that landed in the receive FIFO
    SerialRxLast = 0x7610,
}

impl ControlRequest {
    /// Raw request number passed to `ioctl(2)`
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Argument block shared by every bridge control request
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoctlSerial {
    /// Byte count, or the scalar result for query requests
    pub len: u32,
    /// Payload buffer
    pub data: [u8; SERIAL_DATA_LEN],
}

impl IoctlSerial {
    /// Argument with only the length/value field set
    pub fn with_len(len: u32) -> Self {
        Self {
            len,
            data: [0u8; SERIAL_DATA_LEN],
        }
    }

    /// Argument carrying `bytes` as payload
    pub fn with_data(bytes: &[u8]) -> Result<Self, TransportError> {
        if bytes.len() > SERIAL_DATA_LEN {
            return Err(TransportError::MessageTooLarge {
                len: bytes.len(),
                max: SERIAL_DATA_LEN,
            });
        }
        let mut arg = Self::with_len(bytes.len() as u32);
        arg.data[..bytes.len()].copy_from_slice(bytes);
        Ok(arg)
    }

    /// Valid part of the data buffer as reported by the driver
    pub fn payload(&self) -> &[u8] {
        let len = (self.len as usize).min(SERIAL_DATA_LEN);
        &self.data[..len]
    }
}

impl Default for IoctlSerial {
    fn default() -> Self {
        Self::with_len(0)
    }
}

/// A synchronous request/reply path into the bridge driver
///
/// Implementations must be callable from several threads; the serial layer
/// provides its own ordering on top.
pub trait ControlChannel: Send + Sync {
    /// Issue `request`, letting the driver read and update `arg` in place
    fn call(&self, request: ControlRequest, arg: &mut IoctlSerial) -> Result<(), TransportError>;

    /// Largest payload a single call can carry
    fn max_transfer(&self) -> usize {
        SERIAL_DATA_LEN
    }
}

/// Bridge device node, opened for the duration of each call
#[derive(Debug, Clone)]
pub struct DeviceNode {
    path: PathBuf,
}

impl DeviceNode {
    /// Device node at `path` (e.g. `/dev/v4l-subdev1`). Nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the device node
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File, TransportError> {
        File::open(&self.path).map_err(|source| TransportError::Open {
            path: self.path.clone(),
            source,
        })
    }
}

impl ControlChannel for DeviceNode {
    #[cfg(unix)]
    fn call(&self, request: ControlRequest, arg: &mut IoctlSerial) -> Result<(), TransportError> {
        use std::os::unix::io::AsRawFd;

        let file = self.open()?;
        // SAFETY: the driver reads and writes exactly one `IoctlSerial`, which
        // is `repr(C)` and outlives the call.
        let ret = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                request.code() as _,
                arg as *mut IoctlSerial,
            )
        };
        if ret < 0 {
            let source = std::io::Error::last_os_error();
            tracing::warn!(
                "bridge {}: request {:#06x} failed: {}",
                self.path.display(),
                request.code(),
                source
            );
            return Err(TransportError::Control {
                request: request.code(),
                source,
            });
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn call(&self, request: ControlRequest, _arg: &mut IoctlSerial) -> Result<(), TransportError> {
        let _ = self.open()?;
        Err(TransportError::Control {
            request: request.code(),
            source: std::io::Error::from(std::io::ErrorKind::Unsupported),
        })
    }
}

/// List bridge device links under `/dev/links`, sorted by name
pub fn discover_devices() -> Vec<PathBuf> {
    discover_in(Path::new("/dev/links"))
}

fn discover_in(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| name.starts_with("lvds"))
                    .unwrap_or(false)
            })
            .map(|entry| entry.path())
            .collect(),
        Err(_) => Vec::new(),
    };
    found.sort();
    found
}
