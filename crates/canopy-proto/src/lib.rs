//! # Canopy Protocol: Wire Format
//!
//! This crate implements the framing layer for the Canopy depth-first
//! spanning-tree protocol.
//!
//! ## Protocol Design
//!
//! The protocol has exactly three message kinds, none of which carry a
//! payload:
//!
//! - [`Message::Probe`] extends the traversal onto an unexplored neighbour
//! - [`Message::Accept`] confirms a tree edge, or reports a finished subtree
//!   upstream
//! - [`Message::Reject`] declines a probe because the receiver already has a
//!   parent
//!
//! The sender of a message is never encoded on the wire. Receivers derive it
//! from the network-level origin of the connection.
//!
//! ## Framing
//!
//! Every message travels in a fixed 4-byte [`Frame`] (magic, version, tag).
//! Readers know the exact length up front and never depend on end-of-stream to
//! delimit a message, so a truncated transmission is always detected.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod frame;
pub mod message;

pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use message::Message;
