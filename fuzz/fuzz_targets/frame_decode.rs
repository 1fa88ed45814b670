//! Arbitrary bytes through the frame decoder.
//!
//! Decoding must never panic, and whatever it accepts must be exactly the
//! encoding of the decoded message.

#![no_main]

use canopy_proto::{Frame, ProtocolError};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match Frame::decode(data) {
        Ok(frame) => {
            assert_eq!(frame.to_bytes()[..], data[..Frame::SIZE]);
        },
        Err(ProtocolError::FrameTooShort { expected, actual }) => {
            assert_eq!(expected, Frame::SIZE);
            assert_eq!(actual, data.len());
            assert!(data.len() < Frame::SIZE);
        },
        Err(ProtocolError::InvalidMagic(magic)) => {
            assert_ne!(magic, Frame::MAGIC);
        },
        Err(ProtocolError::UnsupportedVersion(version)) => {
            assert_ne!(version, Frame::VERSION);
        },
        Err(ProtocolError::InvalidTag(tag)) => {
            assert_eq!(tag, data[3]);
        },
    }
});
