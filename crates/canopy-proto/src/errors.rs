//! Error types for the Canopy wire format.

use thiserror::Error;

/// Errors that can occur while decoding a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame is shorter than the fixed frame size
    #[error("frame too short: expected {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected size in bytes
        expected: usize,
        /// Actual size received
        actual: usize,
    },

    /// Invalid magic number in frame
    #[error("invalid magic number: expected 0x434E (\"CN\"), got {0:#06x}")]
    InvalidMagic(u16),

    /// Unsupported protocol version
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Unknown message tag
    #[error("invalid message tag: {0:#04x}")]
    InvalidTag(u8),
}

/// Convenient Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
