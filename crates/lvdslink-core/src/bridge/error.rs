//! Transport errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the bridge's control channel
///
/// These are fatal to the call that raised them and are never retried
/// internally.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to open bridge device {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Control call {request:#06x} failed: {source}")]
    Control {
        request: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Message of {len} bytes exceeds the {max}-byte transfer limit")]
    MessageTooLarge { len: usize, max: usize },

    #[error("Invalid bridge configuration: {0}")]
    Config(String),
}

impl TransportError {
    /// Control request code that failed, if this error came from a driver call
    pub fn request(&self) -> Option<u32> {
        match self {
            TransportError::Control { request, .. } => Some(*request),
            _ => None,
        }
    }
}
