//! LVDS2MIPI Bridge Transport
//!
//! Request/response access to the bridge's software-emulated UART.
//!
//! The driver offers no "response complete" notification, so a transaction
//! ends once the receive count has stopped changing for a settle window.

mod error;
pub mod ioctl;
mod serial;
pub mod status;
pub mod video;

pub use error::TransportError;
pub use ioctl::{discover_devices, ControlChannel, ControlRequest, DeviceNode, IoctlSerial};
pub use serial::{LvdsSerial, Reply, Transceiver};
pub use status::{LvdsStatus, UartStatus};
pub use video::VideoTiming;

/// Maximum number of bytes moved by one send or receive call
pub const MAX_TRANSFER: usize = ioctl::SERIAL_DATA_LEN;

/// Default bridge UART baud rate (24 MHz / 2500)
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default wait for the first response byte, in milliseconds
pub const DEFAULT_START_TIMEOUT_MS: u64 = 100;

/// Default quiet window that marks a response as complete, in milliseconds
pub const DEFAULT_SETTLE_MS: u64 = 120;

/// Default receive-count polling period, in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2;
