//! # lvdslink Core Library
//!
//! Host-side control of cameras connected through the Videology LVDS2MIPI
//! bridge.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Request/response serial transport over the bridge's emulated UART
//! - The checksum-framed Tamarisk thermal core command protocol
//! - Bridge diagnostics (firmware version, link status, video timing)
//!
//! ## Example
//!
//! ```rust,ignore
//! use lvdslink_core::{config::BridgeConfig, tamarisk::Tamarisk};
//!
//! let config = BridgeConfig::tamarisk("/dev/links/lvds2mipi_1");
//! let camera = Tamarisk::open(&config)?;
//!
//! let version = camera.get_system_version()?;
//! println!("{:02x?}", version.payload());
//! ```

pub mod bridge;
pub mod config;
pub mod tamarisk;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bridge::{LvdsSerial, Transceiver, TransportError, UartStatus, VideoTiming};
    pub use crate::config::BridgeConfig;
    pub use crate::tamarisk::{Command, ErrorStage, Packet, ProtocolError, Tamarisk};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
