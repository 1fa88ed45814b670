//! Snapshot tests for wire format stability.
//!
//! If the wire format changes, these tests fail, ensuring we don't
//! accidentally break compatibility between node versions.

use canopy_proto::{Frame, Message, ProtocolError};
use insta::assert_snapshot;
use proptest::prelude::*;

/// Helper to encode frame to hex string for snapshot
fn frame_to_hex(message: Message) -> String {
    let mut buf = Vec::new();
    Frame::new(message).encode(&mut buf);
    hex::encode(&buf)
}

#[test]
fn snapshot_probe_frame() {
    assert_snapshot!(frame_to_hex(Message::Probe), @"434e014d");
}

#[test]
fn snapshot_accept_frame() {
    assert_snapshot!(frame_to_hex(Message::Accept), @"434e0150");
}

#[test]
fn snapshot_reject_frame() {
    assert_snapshot!(frame_to_hex(Message::Reject), @"434e0152");
}

proptest! {
    #[test]
    fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..16)) {
        let _ = Frame::decode(&bytes);
    }

    #[test]
    fn decode_accepts_only_known_tags(tag in any::<u8>()) {
        let bytes = [0x43, 0x4E, Frame::VERSION, tag];

        match Message::from_tag(tag) {
            Some(message) => prop_assert_eq!(Frame::decode(&bytes), Ok(Frame::new(message))),
            None => prop_assert_eq!(Frame::decode(&bytes), Err(ProtocolError::InvalidTag(tag))),
        }
    }
}
