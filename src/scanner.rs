//! Sequential forensic scanner for metadata journals.
//!
//! Unlike a replay-oriented reader, the scanner is written to detect,
//! record, and read *past* damage: a missing object, a bad sentinel, or an
//! undecodable event is a finding, not a failure. [`JournalScanner::scan`]
//! errors only when the object store itself is unusable (connection or
//! pool resolution); everything else lands on the scan result and in
//! [`JournalScanner::is_healthy`].
//!
//! ## Frame format (little-endian)
//!
//! `[sentinel:u64][entry_size:u32][payload bytes...][start_ptr:u64]`
//!
//! `start_ptr` records the absolute journal offset of the frame's own
//! sentinel; it is what lets the walker confirm a resync candidate when
//! searching for the next frame after a gap.
//!
//! ## Walker state machine
//!
//! `NORMAL → GAP` on a missing object, an invalid sentinel, or a frame
//! that will not decode; `GAP → NORMAL` when a sentinel whose trailing
//! back-pointer matches its own offset is found. A scan that ends in GAP
//! records an invalid range open-ended at `u64::MAX`.

use crate::error::JournalResult;
use crate::events::{EventDecoder, LogEvent, LogEventRegistry};
use crate::formats::{DEFAULT_OBJECT_SIZE, EVENT_SENTINEL, FRAME_OVERHEAD};
use crate::header::JournalHeader;
use crate::objects;
use crate::store::{BlockingObjectStore, ObjectStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Accepts or rejects a decoded event before it enters the result map.
///
/// Rejected events are discarded, but their offsets still count as valid.
pub type EventFilter = Box<dyn Fn(u64, &LogEvent) -> bool + Send + Sync>;

/// A byte range of journal that could not be parsed. An end of `u64::MAX`
/// means the damage ran to the end of the journal.
pub type InvalidRange = (u64, u64);

/// Scans one rank's journal and records what it finds.
pub struct JournalScanner {
    rank: u64,
    pool_id: i64,
    store: Arc<dyn ObjectStore>,
    decoder: Arc<dyn EventDecoder>,
    filter: Option<EventFilter>,
    default_object_size: u64,

    /// Whether the header object could be read at all.
    pub header_present: bool,
    /// Whether the header decoded with the right magic and sane offsets.
    pub header_valid: bool,
    /// The decoded header, when decoding got that far.
    pub header: Option<JournalHeader>,
    /// Names of segment objects that were readable, in walk order.
    pub objects_valid: Vec<String>,
    /// Segment indices of objects that could not be read, in walk order.
    pub objects_missing: Vec<u64>,
    /// Decoded events that passed the filter, keyed by absolute offset.
    pub events: BTreeMap<u64, LogEvent>,
    /// Offsets of every frame that decoded, filtered or not.
    pub events_valid: Vec<u64>,
    /// Byte ranges where no valid frame could be parsed.
    pub ranges_invalid: Vec<InvalidRange>,
}

impl JournalScanner {
    /// Scanner for `rank`'s journal in pool `pool_id`, using the default
    /// event registry.
    pub fn new(store: Arc<dyn ObjectStore>, rank: u64, pool_id: i64) -> Self {
        Self {
            rank,
            pool_id,
            store,
            decoder: Arc::new(LogEventRegistry),
            filter: None,
            default_object_size: u64::from(DEFAULT_OBJECT_SIZE),
            header_present: false,
            header_valid: false,
            header: None,
            objects_valid: Vec::new(),
            objects_missing: Vec::new(),
            events: BTreeMap::new(),
            events_valid: Vec::new(),
            ranges_invalid: Vec::new(),
        }
    }

    /// Replace the event decoder.
    pub fn with_decoder(mut self, decoder: Arc<dyn EventDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Install a filtering predicate consulted before events are stored.
    pub fn with_filter(mut self, filter: EventFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Object size to assume when the header carries no usable layout.
    pub fn with_default_object_size(mut self, bytes: u64) -> Self {
        if bytes > 0 {
            self.default_object_size = bytes;
        }
        self
    }

    /// Read the header, then walk the framed event stream.
    ///
    /// Returns an error only when the object store is unreachable or the
    /// pool cannot be resolved. Journal damage of any kind is recorded on
    /// the result and the call still returns `Ok`.
    pub fn scan(&mut self) -> JournalResult<()> {
        self.store.connect()?;
        let pool_name = self.store.pool_reverse_lookup(self.pool_id)?;
        debug!(pool = %pool_name, rank = self.rank, "scanning journal");

        self.scan_header();
        if self.header_valid {
            self.scan_events();
        }
        Ok(())
    }

    /// `header_present ∧ header_valid ∧ no missing objects ∧ no gaps`.
    pub fn is_healthy(&self) -> bool {
        self.header_present
            && self.header_valid
            && self.objects_missing.is_empty()
            && self.ranges_invalid.is_empty()
    }

    fn scan_header(&mut self) {
        let name = objects::object_name(objects::log_ino(self.rank), 0);
        let bytes = match self.store.read_sync(&name, 0, u64::MAX) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(object = %name, error = %e, "journal header is unreadable");
                return;
            }
        };
        self.header_present = true;

        let header = match JournalHeader::decode(&bytes) {
            Ok(header) => header,
            Err(e) => {
                warn!(error = %e, "journal header is corrupt");
                return;
            }
        };
        if header.magic != crate::formats::JOURNAL_MAGIC {
            warn!(magic = %header.magic, "journal header has bad magic");
            self.header = Some(header);
            return;
        }
        if !(header.trimmed_pos <= header.expire_pos && header.expire_pos <= header.write_pos) {
            warn!(
                trimmed_pos = header.trimmed_pos,
                expire_pos = header.expire_pos,
                write_pos = header.write_pos,
                "journal header offsets are inconsistent"
            );
            self.header = Some(header);
            return;
        }
        self.header_valid = true;
        self.header = Some(header);
    }

    fn scan_events(&mut self) {
        let Some(header) = self.header.clone() else {
            return;
        };
        let object_size = match &header.layout {
            Some(layout) if layout.object_size != 0 => u64::from(layout.object_size),
            _ => self.default_object_size,
        };
        let ino = objects::log_ino(self.rank);
        let expire_pos = header.expire_pos;
        let write_pos = header.write_pos;

        debug!(
            trimmed_pos = header.trimmed_pos,
            expire_pos, write_pos, object_size, "starting journal walk"
        );
        if expire_pos == write_pos {
            debug!("journal is empty");
            return;
        }

        let start_index = expire_pos / object_size;
        let end_index = (write_pos - 1) / object_size;

        // Rolling buffer of unconsumed bytes; `buf_base` is the absolute
        // journal offset of its first byte. In NORMAL mode the next parse
        // position `read_offset` always equals `buf_base`.
        let mut buf: Vec<u8> = Vec::new();
        let mut buf_base = expire_pos;
        let mut read_offset = expire_pos;
        let mut gap = false;
        let mut gap_start = 0u64;

        for index in start_index..=end_index {
            let name = objects::object_name(ino, index);
            let mut fresh = match self.store.read_sync(&name, 0, u64::MAX) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(object = %name, error = %e, "missing journal object");
                    self.objects_missing.push(index);
                    if !gap {
                        gap = true;
                        gap_start = read_offset;
                    }
                    // Bytes buffered before the hole can no longer complete
                    // a frame; restart accumulation at the next boundary.
                    buf.clear();
                    buf_base = (index + 1) * object_size;
                    read_offset = buf_base;
                    continue;
                }
            };
            self.objects_valid.push(name);

            let object_start = index * object_size;
            // Clamp to the live range [expire_pos, write_pos).
            if object_start + fresh.len() as u64 > write_pos {
                fresh.truncate((write_pos - object_start) as usize);
            }
            let buf_end = buf_base + buf.len() as u64;
            if object_start < buf_end {
                // First object of the walk may begin before expire_pos.
                let skip = (buf_end - object_start) as usize;
                if skip >= fresh.len() {
                    continue;
                }
                fresh.drain(..skip);
            } else if object_start > buf_end {
                // Short object upstream left unwritten journal bytes.
                debug!(
                    expected = buf_end,
                    found = object_start,
                    "journal bytes missing before object"
                );
                if !gap {
                    gap = true;
                    gap_start = read_offset;
                }
                buf.clear();
                buf_base = object_start;
                read_offset = object_start;
            }
            buf.extend_from_slice(&fresh);

            if gap {
                // Fresh bytes after a gap: look for the next believable frame.
                if let Some(resync) = search_sentinel(&mut buf, &mut buf_base, write_pos) {
                    debug!(gap_start, resync, "resynchronized after gap");
                    self.ranges_invalid.push((gap_start, resync));
                    gap = false;
                    read_offset = resync;
                }
            }

            while !gap {
                if buf.len() < 12 {
                    break;
                }
                let sentinel = read_u64_at(&buf, 0);
                let entry_size = u64::from(read_u32_at(&buf, 8));
                if sentinel != EVENT_SENTINEL {
                    debug!("invalid sentinel at {read_offset:#x}");
                    gap = true;
                    gap_start = read_offset;
                    break;
                }

                let frame_len = FRAME_OVERHEAD + entry_size;
                if (buf.len() as u64) < frame_len {
                    // Out of data; continue with the next object.
                    break;
                }

                let payload = &buf[12..12 + entry_size as usize];
                let start_ptr = read_u64_at(&buf, 12 + entry_size as usize);
                let event = if start_ptr == read_offset {
                    self.decoder.decode(payload)
                } else {
                    debug!(
                        start_ptr,
                        "frame at {read_offset:#x} has a mismatched back-pointer"
                    );
                    None
                };

                match event {
                    Some(event) => {
                        let accepted = self
                            .filter
                            .as_ref()
                            .map_or(true, |accept| accept(read_offset, &event));
                        if accepted {
                            self.events.insert(read_offset, event);
                        }
                        self.events_valid.push(read_offset);
                        buf.drain(..frame_len as usize);
                        buf_base += frame_len;
                        read_offset = buf_base;
                    }
                    None => {
                        debug!("undecodable event at {read_offset:#x}");
                        gap = true;
                        gap_start = read_offset;
                        // Skip one byte so the sentinel search cannot
                        // reselect this frame.
                        buf.drain(..1);
                        buf_base += 1;
                        read_offset = buf_base;
                        break;
                    }
                }
            }
        }

        if gap {
            // Ended inside a gap; assume it ran to the end.
            self.ranges_invalid.push((gap_start, u64::MAX));
        } else if !buf.is_empty() {
            // A frame started before write_pos but never completed.
            debug!("torn frame at {read_offset:#x} runs past write_pos");
            self.ranges_invalid.push((read_offset, u64::MAX));
        }

        debug!(
            objects_missing = self.objects_missing.len(),
            objects_valid = self.objects_valid.len(),
            gaps = self.ranges_invalid.len(),
            events_valid = self.events_valid.len(),
            "journal walk complete"
        );
    }
}

fn read_u32_at(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64_at(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

/// Search `buf` for a sentinel whose frame confirms itself via its
/// trailing back-pointer. On success, drops everything before the frame,
/// rebases the buffer there, and returns the resync offset. On a miss,
/// drops every byte that can no longer begin a frame (keeping a possible
/// boundary-straddling candidate, or the last 7 bytes of a partial
/// sentinel) and returns `None`.
fn search_sentinel(buf: &mut Vec<u8>, buf_base: &mut u64, write_pos: u64) -> Option<u64> {
    let needle = EVENT_SENTINEL.to_le_bytes();
    let mut i = 0usize;
    let mut keep_from = None;
    while i + 8 <= buf.len() {
        if buf[i..i + 8] != needle {
            i += 1;
            continue;
        }
        let candidate = *buf_base + i as u64;
        if candidate >= write_pos {
            break;
        }
        if i + 12 > buf.len() {
            // Sentinel found but no size yet; wait for more bytes.
            keep_from = Some(i);
            break;
        }
        let entry_size = u64::from(read_u32_at(buf, i + 8));
        let frame_len = FRAME_OVERHEAD + entry_size;
        if ((buf.len() - i) as u64) < frame_len {
            if candidate + frame_len <= write_pos {
                // Incomplete but could still fit; wait for more bytes.
                keep_from = Some(i);
                break;
            }
            // A frame this size cannot end before write_pos; false match.
            i += 1;
            continue;
        }
        let start_ptr = read_u64_at(buf, i + 12 + entry_size as usize);
        if start_ptr == candidate {
            buf.drain(..i);
            *buf_base = candidate;
            return Some(candidate);
        }
        i += 1;
    }

    let from = keep_from.unwrap_or_else(|| buf.len().saturating_sub(7));
    buf.drain(..from);
    *buf_base += from as u64;
    None
}
