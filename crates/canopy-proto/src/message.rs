//! Message kinds exchanged between neighbouring nodes.

use std::fmt;

/// A protocol message.
///
/// Messages carry no payload beyond their kind. Each kind has a stable
/// one-byte tag used on the wire; the tags are the ASCII letters the protocol
/// has always used for these messages (`M`, `P`, `R`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Message {
    /// Discovery token sent to an unexplored neighbour
    Probe,
    /// Tree edge confirmed, or subtree finished when sent to the parent
    Accept,
    /// Receiver already has a parent; the edge stays out of the tree
    Reject,
}

impl Message {
    /// All message kinds, in tag order.
    pub const ALL: [Message; 3] = [Message::Probe, Message::Accept, Message::Reject];

    /// Wire tag for this message kind.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Message::Probe => b'M',
            Message::Accept => b'P',
            Message::Reject => b'R',
        }
    }

    /// Parse a wire tag. Returns `None` for unknown tags.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'M' => Some(Message::Probe),
            b'P' => Some(Message::Accept),
            b'R' => Some(Message::Reject),
            _ => None,
        }
    }

    /// Whether this message answers a probe (`Accept` or `Reject`).
    #[must_use]
    pub const fn is_response(self) -> bool {
        matches!(self, Message::Accept | Message::Reject)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Message::Probe => "Probe",
            Message::Accept => "Accept",
            Message::Reject => "Reject",
        };
        f.write_str(name)
    }
}
