//! Fixed-size frame carrying a single message.
//!
//! Layout on the wire (Big Endian):
//!
//! ```text
//! ┌──────────────┬─────────────┬──────────┐
//! │ magic (u16)  │ version (u8)│ tag (u8) │
//! │ 0x434E "CN"  │ 0x01        │ M / P / R│
//! └──────────────┴─────────────┴──────────┘
//! ```
//!
//! A connection carries exactly one frame. The reader knows the frame is
//! [`Frame::SIZE`] bytes long, so a short read is an error instead of an
//! ambiguous end-of-stream.

use bytes::BufMut;

use crate::{
    Message,
    errors::{ProtocolError, Result},
};

/// A framed protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// The message carried by this frame
    pub message: Message,
}

impl Frame {
    /// Size of an encoded frame in bytes.
    pub const SIZE: usize = 4;

    /// Magic number identifying Canopy frames ("CN").
    pub const MAGIC: u16 = 0x434E;

    /// Current protocol version.
    pub const VERSION: u8 = 1;

    /// Wrap a message in a frame.
    #[must_use]
    pub const fn new(message: Message) -> Self {
        Self { message }
    }

    /// Encode into a fixed-size byte array.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let magic = Self::MAGIC.to_be_bytes();
        [magic[0], magic[1], Self::VERSION, self.message.tag()]
    }

    /// Encode frame into buffer.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(&self.to_bytes());
    }

    /// Decode a frame from the start of `src`.
    ///
    /// Trailing bytes beyond [`Frame::SIZE`] are ignored; callers reading from
    /// a stream read exactly `SIZE` bytes.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::FrameTooShort`] if fewer than `SIZE` bytes are given
    /// - [`ProtocolError::InvalidMagic`] if the magic number does not match
    /// - [`ProtocolError::UnsupportedVersion`] for any version but
    ///   [`Frame::VERSION`]
    /// - [`ProtocolError::InvalidTag`] for an unknown message tag
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < Self::SIZE {
            return Err(ProtocolError::FrameTooShort { expected: Self::SIZE, actual: src.len() });
        }

        let magic = u16::from_be_bytes([src[0], src[1]]);
        if magic != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }

        if src[2] != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(src[2]));
        }

        let message = Message::from_tag(src[3]).ok_or(ProtocolError::InvalidTag(src[3]))?;

        Ok(Self { message })
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        Self::new(message)
    }
}
