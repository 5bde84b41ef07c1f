//! Shared journal fixtures for integration tests.
//!
//! Important: this file lives under `tests/support/` so it is **not**
//! compiled as a standalone integration test target.

#![allow(dead_code)]

use journal_forensics::events::LogEvent;
use journal_forensics::formats::{FileLayout, EVENT_SENTINEL, JOURNAL_MAGIC};
use journal_forensics::header::JournalHeader;
use journal_forensics::objects;
use journal_forensics::store::{BlockingObjectStore, MemoryObjectStore};

/// Pool id every fixture registers as "metadata".
pub const POOL_ID: i64 = 2;

/// A journal built into an in-memory store, with ground truth kept around.
pub struct JournalFixture {
    /// The store holding header and segment objects.
    pub store: MemoryObjectStore,
    /// Object size used for striping.
    pub object_size: u64,
    /// Journal offset of the first event.
    pub expire_pos: u64,
    /// One past the last framed byte.
    pub write_pos: u64,
    /// Absolute offset of each event, in append order.
    pub offsets: Vec<u64>,
    /// The events themselves, in append order.
    pub events: Vec<LogEvent>,
    /// The linear framed byte stream, starting at `expire_pos`.
    pub stream: Vec<u8>,
}

impl JournalFixture {
    /// Framed length of the event at `offsets[i]`.
    pub fn frame_len(&self, i: usize) -> u64 {
        let end = self
            .offsets
            .get(i + 1)
            .copied()
            .unwrap_or(self.write_pos);
        end - self.offsets[i]
    }

    /// Segment object name for `index` in this fixture's journal.
    pub fn object_name(&self, index: u64) -> String {
        objects::object_name(objects::log_ino(0), index)
    }
}

/// Frame one event payload at `offset`: sentinel, size, payload, back-pointer.
pub fn frame(offset: u64, event: &LogEvent) -> Vec<u8> {
    let payload = event.encode().unwrap();
    let mut out = EVENT_SENTINEL.to_le_bytes().to_vec();
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&offset.to_le_bytes());
    out
}

/// Build rank 0's journal: header in segment 0, events framed back to back
/// from `expire_pos`, striped across objects of `object_size` bytes.
pub fn build_journal(object_size: u32, expire_pos: u64, events: &[LogEvent]) -> JournalFixture {
    let store = MemoryObjectStore::with_pool(POOL_ID, "metadata");
    let ino = objects::log_ino(0);

    let mut stream = Vec::new();
    let mut offsets = Vec::new();
    let mut pos = expire_pos;
    for event in events {
        offsets.push(pos);
        let framed = frame(pos, event);
        pos += framed.len() as u64;
        stream.extend_from_slice(&framed);
    }
    let write_pos = pos;

    let header = JournalHeader {
        magic: JOURNAL_MAGIC.to_string(),
        trimmed_pos: expire_pos,
        expire_pos,
        write_pos,
        layout: Some(FileLayout {
            stripe_unit: object_size,
            stripe_count: 1,
            object_size,
            pool_id: POOL_ID,
        }),
    };
    store
        .write_full_sync(&objects::object_name(ino, 0), &header.encode().unwrap())
        .unwrap();
    write_stream(&store, ino, u64::from(object_size), expire_pos, &stream);

    JournalFixture {
        store,
        object_size: u64::from(object_size),
        expire_pos,
        write_pos,
        offsets,
        events: events.to_vec(),
        stream,
    }
}

/// Stripe `bytes` into segment objects starting at absolute offset `start`.
pub fn write_stream(store: &MemoryObjectStore, ino: u64, object_size: u64, start: u64, bytes: &[u8]) {
    let mut pos = start;
    let mut rest = bytes;
    while !rest.is_empty() {
        let index = pos / object_size;
        let intra = pos % object_size;
        let take = ((object_size - intra).min(rest.len() as u64)) as usize;
        store
            .write_sync(&objects::object_name(ino, index), intra, &rest[..take])
            .unwrap();
        pos += take as u64;
        rest = &rest[take..];
    }
}

/// A small update event with a deterministic shape.
pub fn update(path: &str, ino: u64) -> LogEvent {
    LogEvent::Update {
        path: path.to_string(),
        ino,
        dirfrag: 0x600,
        dentry: path.rsplit('/').next().unwrap_or("").to_string(),
    }
}
