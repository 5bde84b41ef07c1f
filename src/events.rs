//! Typed log events and the on-disk event registry.
//!
//! ## Payload wire format
//!
//! `[type_tag:u32 LE][postcard body]`
//!
//! The registry is open-ended: new event types appear over time, and a
//! forensic tool must not drop what it cannot interpret. A payload with an
//! unrecognised tag decodes to [`LogEvent::Unknown`], which carries the
//! raw body and re-encodes byte-identically.

use crate::error::{JournalError, JournalResult};
use serde::{Deserialize, Serialize};

const TAG_SESSION: u32 = 1;
const TAG_SUBTREE_MAP: u32 = 2;
const TAG_UPDATE: u32 = 3;
const TAG_OPEN: u32 = 4;
const TAG_COMMITTED: u32 = 5;
const TAG_NOOP: u32 = 6;

/// One decoded metadata log event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEvent {
    /// A client session opened or closed.
    Session {
        /// Client identifier.
        client_id: u64,
        /// True for open, false for close.
        open: bool,
    },
    /// Periodic map of the subtrees this rank is authoritative for.
    SubtreeMap {
        /// Root paths of the authoritative subtrees.
        subtrees: Vec<String>,
    },
    /// A metadata mutation under `path`.
    Update {
        /// Full path of the primary dentry touched.
        path: String,
        /// Inode the mutation applies to.
        ino: u64,
        /// Directory fragment holding the dentry.
        dirfrag: u64,
        /// Dentry name within the fragment.
        dentry: String,
    },
    /// Inodes pinned open across journal segments.
    Open {
        /// The pinned inodes.
        inos: Vec<u64>,
    },
    /// A client request fully committed.
    Committed {
        /// Request identifier.
        reqid: u64,
    },
    /// Padding event carrying no state.
    NoOp,
    /// An event whose type tag this build does not know.
    Unknown {
        /// The unrecognised tag.
        type_tag: u32,
        /// The raw body, preserved verbatim.
        bytes: Vec<u8>,
    },
}

impl LogEvent {
    /// Stable numeric type tag, as written on disk.
    pub fn type_tag(&self) -> u32 {
        match self {
            LogEvent::Session { .. } => TAG_SESSION,
            LogEvent::SubtreeMap { .. } => TAG_SUBTREE_MAP,
            LogEvent::Update { .. } => TAG_UPDATE,
            LogEvent::Open { .. } => TAG_OPEN,
            LogEvent::Committed { .. } => TAG_COMMITTED,
            LogEvent::NoOp => TAG_NOOP,
            LogEvent::Unknown { type_tag, .. } => *type_tag,
        }
    }

    /// Stable human-readable type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            LogEvent::Session { .. } => "ESession",
            LogEvent::SubtreeMap { .. } => "ESubtreeMap",
            LogEvent::Update { .. } => "EUpdate",
            LogEvent::Open { .. } => "EOpen",
            LogEvent::Committed { .. } => "ECommitted",
            LogEvent::NoOp => "ENoOp",
            LogEvent::Unknown { .. } => "EUnknown",
        }
    }

    /// Path the event refers to, if it carries one.
    pub fn path(&self) -> Option<&str> {
        match self {
            LogEvent::Update { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Whether the event references inode `ino`.
    pub fn references_ino(&self, ino: u64) -> bool {
        match self {
            LogEvent::Update { ino: event_ino, .. } => *event_ino == ino,
            LogEvent::Open { inos } => inos.contains(&ino),
            _ => false,
        }
    }

    /// Serialize the event payload (tag + body, no journal framing).
    pub fn encode(&self) -> JournalResult<Vec<u8>> {
        let mut out = self.type_tag().to_le_bytes().to_vec();
        match self {
            LogEvent::Unknown { bytes, .. } => out.extend_from_slice(bytes),
            known => {
                let body = postcard::to_allocvec(known)
                    .map_err(|e| JournalError::Encode(e.to_string()))?;
                out.extend_from_slice(&body);
            }
        }
        Ok(out)
    }

    /// Decode an event payload; `None` when the payload is malformed.
    ///
    /// The body of a known tag must postcard-decode to the same tag with
    /// no trailing bytes; anything else is treated as corruption rather
    /// than forward compatibility.
    pub fn decode(bytes: &[u8]) -> Option<LogEvent> {
        let tag_bytes: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        let tag = u32::from_le_bytes(tag_bytes);
        let body = &bytes[4..];
        match tag {
            TAG_SESSION | TAG_SUBTREE_MAP | TAG_UPDATE | TAG_OPEN | TAG_COMMITTED | TAG_NOOP => {
                let (event, rest) = postcard::take_from_bytes::<LogEvent>(body).ok()?;
                (rest.is_empty() && event.type_tag() == tag).then_some(event)
            }
            _ => Some(LogEvent::Unknown {
                type_tag: tag,
                bytes: body.to_vec(),
            }),
        }
    }
}

/// Injected event-registry decoder capability.
pub trait EventDecoder: Send + Sync {
    /// Decode one event payload; `None` when the payload is malformed.
    fn decode(&self, bytes: &[u8]) -> Option<LogEvent>;
}

/// The default registry over the known event set.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventRegistry;

impl EventDecoder for LogEventRegistry {
    fn decode(&self, bytes: &[u8]) -> Option<LogEvent> {
        LogEvent::decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(path: &str) -> LogEvent {
        LogEvent::Update {
            path: path.to_string(),
            ino: 0x1000_0000_0001,
            dirfrag: 1,
            dentry: path.rsplit('/').next().unwrap_or("").to_string(),
        }
    }

    #[test]
    fn known_events_roundtrip() {
        let events = [
            LogEvent::Session {
                client_id: 4100,
                open: true,
            },
            LogEvent::SubtreeMap {
                subtrees: vec!["/".into(), "/home".into()],
            },
            update("/a"),
            LogEvent::Open {
                inos: vec![1, 2, 3],
            },
            LogEvent::Committed { reqid: 77 },
            LogEvent::NoOp,
        ];
        for event in events {
            let bytes = event.encode().unwrap();
            assert_eq!(LogEvent::decode(&bytes), Some(event));
        }
    }

    #[test]
    fn unknown_tag_roundtrips_verbatim() {
        let raw = [0xAAu8, 0, 0, 0, 1, 2, 3, 4, 5];
        let event = LogEvent::decode(&raw).unwrap();
        assert_eq!(event.type_name(), "EUnknown");
        assert_eq!(event.type_tag(), 0xAA);
        assert_eq!(event.encode().unwrap(), raw);
    }

    #[test]
    fn garbage_body_is_rejected() {
        // Valid tag, body that is not a postcard encoding of that variant.
        let mut bytes = TAG_UPDATE.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0xFF; 16]);
        assert_eq!(LogEvent::decode(&bytes), None);

        // Too short for a tag.
        assert_eq!(LogEvent::decode(&[1, 2]), None);
    }

    #[test]
    fn trailing_bytes_after_a_known_body_are_corruption() {
        let mut bytes = update("/a").encode().unwrap();
        bytes.push(0);
        assert_eq!(LogEvent::decode(&bytes), None);
    }

    #[test]
    fn inode_references() {
        assert!(update("/a").references_ino(0x1000_0000_0001));
        assert!(!update("/a").references_ino(7));
        assert!(LogEvent::Open { inos: vec![7] }.references_ino(7));
        assert!(!LogEvent::NoOp.references_ino(7));
    }
}
