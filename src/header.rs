//! Journal header and journal-pointer records.
//!
//! Both are persisted as whole-object payloads and framed with the same
//! versioned-block envelope (little-endian integers):
//!
//! `[struct_v:u8][compat_v:u8][payload_len:u32][payload...]`
//!
//! Header payload:
//! `[magic_len:u32][magic bytes][trimmed_pos:u64][expire_pos:u64][write_pos:u64][layout?]`
//! where the optional layout block is
//! `[stripe_unit:u32][stripe_count:u32][object_size:u32][pool_id:i64]`.
//! A header without the layout block (or with a zero object size) falls
//! back to the default object size at scan time.
//!
//! Pointer payload: `[front:u64][back:u64]`.

use crate::error::{JournalError, JournalResult};
use crate::formats::{
    FileLayout, COMPAT_VERSION, DEFAULT_OBJECT_SIZE, JOURNAL_MAGIC, STRUCT_VERSION,
};
use crate::objects;
use crate::store::{BlockingObjectStore, ObjectStore};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

const MAX_MAGIC_BYTES: u32 = 64;
const LAYOUT_BYTES: usize = 4 + 4 + 4 + 8;

fn short_read(e: std::io::Error) -> JournalError {
    JournalError::Decode(format!("truncated record: {e}"))
}

fn read_envelope<'a>(bytes: &'a [u8], what: &str) -> JournalResult<(Cursor<&'a [u8]>, usize)> {
    let mut cur = Cursor::new(bytes);
    let _struct_v = cur.read_u8().map_err(short_read)?;
    let compat_v = cur.read_u8().map_err(short_read)?;
    if compat_v > STRUCT_VERSION {
        return Err(JournalError::Decode(format!(
            "{what} requires format version {compat_v}, this build reads up to {STRUCT_VERSION}"
        )));
    }
    let payload_len = cur.read_u32::<LittleEndian>().map_err(short_read)? as usize;
    let available = bytes.len() - cur.position() as usize;
    if payload_len > available {
        return Err(JournalError::Decode(format!(
            "{what} payload length {payload_len} exceeds {available} available bytes"
        )));
    }
    Ok((cur, payload_len))
}

fn write_envelope(payload: Vec<u8>) -> JournalResult<Vec<u8>> {
    let mut out = Vec::with_capacity(6 + payload.len());
    out.write_u8(STRUCT_VERSION)?;
    out.write_u8(COMPAT_VERSION)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| JournalError::Encode("record payload too large".into()))?;
    out.write_u32::<LittleEndian>(len)?;
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Bookkeeping record stored in a journal's segment-0 object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalHeader {
    /// ASCII magic tag; must equal [`JOURNAL_MAGIC`].
    pub magic: String,
    /// Lower bound of the live log.
    pub trimmed_pos: u64,
    /// Replay start point; `trimmed_pos <= expire_pos`.
    pub expire_pos: u64,
    /// One past the last written byte; `expire_pos <= write_pos`.
    pub write_pos: u64,
    /// Striping descriptor; absent headers use the default layout.
    pub layout: Option<FileLayout>,
}

impl JournalHeader {
    /// Fresh header covering `[start, start + len)`, as written by a restore.
    pub fn for_restore(start: u64, len: u64, pool_id: i64) -> Self {
        Self {
            magic: JOURNAL_MAGIC.to_string(),
            trimmed_pos: start,
            expire_pos: start,
            write_pos: start + len,
            layout: Some(FileLayout::with_pool(pool_id)),
        }
    }

    /// The well-known magic plus `trimmed_pos <= expire_pos <= write_pos`.
    pub fn is_consistent(&self) -> bool {
        self.magic == JOURNAL_MAGIC
            && self.trimmed_pos <= self.expire_pos
            && self.expire_pos <= self.write_pos
    }

    /// Object size from the layout, or the default when absent or zero.
    pub fn object_size(&self) -> u64 {
        match &self.layout {
            Some(layout) => layout.object_size_or_default(),
            None => u64::from(DEFAULT_OBJECT_SIZE),
        }
    }

    /// Serialize into the versioned-block envelope.
    pub fn encode(&self) -> JournalResult<Vec<u8>> {
        let mut payload = Vec::new();
        let magic_len = u32::try_from(self.magic.len())
            .ok()
            .filter(|n| *n <= MAX_MAGIC_BYTES)
            .ok_or_else(|| JournalError::Encode("header magic too long".into()))?;
        payload.write_u32::<LittleEndian>(magic_len)?;
        payload.extend_from_slice(self.magic.as_bytes());
        payload.write_u64::<LittleEndian>(self.trimmed_pos)?;
        payload.write_u64::<LittleEndian>(self.expire_pos)?;
        payload.write_u64::<LittleEndian>(self.write_pos)?;
        if let Some(layout) = &self.layout {
            payload.write_u32::<LittleEndian>(layout.stripe_unit)?;
            payload.write_u32::<LittleEndian>(layout.stripe_count)?;
            payload.write_u32::<LittleEndian>(layout.object_size)?;
            payload.write_i64::<LittleEndian>(layout.pool_id)?;
        }
        write_envelope(payload)
    }

    /// Decode from the versioned-block envelope.
    pub fn decode(bytes: &[u8]) -> JournalResult<Self> {
        let (mut cur, payload_len) = read_envelope(bytes, "journal header")?;
        let payload_end = cur.position() as usize + payload_len;

        let magic_len = cur.read_u32::<LittleEndian>().map_err(short_read)?;
        if magic_len > MAX_MAGIC_BYTES {
            return Err(JournalError::Decode(format!(
                "implausible magic length {magic_len}"
            )));
        }
        let mut magic_buf = vec![0u8; magic_len as usize];
        cur.read_exact(&mut magic_buf).map_err(short_read)?;
        let magic = String::from_utf8(magic_buf)
            .map_err(|_| JournalError::Decode("header magic is not valid UTF-8".into()))?;

        let trimmed_pos = cur.read_u64::<LittleEndian>().map_err(short_read)?;
        let expire_pos = cur.read_u64::<LittleEndian>().map_err(short_read)?;
        let write_pos = cur.read_u64::<LittleEndian>().map_err(short_read)?;

        let remaining = payload_end.saturating_sub(cur.position() as usize);
        let layout = if remaining >= LAYOUT_BYTES {
            Some(FileLayout {
                stripe_unit: cur.read_u32::<LittleEndian>().map_err(short_read)?,
                stripe_count: cur.read_u32::<LittleEndian>().map_err(short_read)?,
                object_size: cur.read_u32::<LittleEndian>().map_err(short_read)?,
                pool_id: cur.read_i64::<LittleEndian>().map_err(short_read)?,
            })
        } else {
            None
        };

        Ok(Self {
            magic,
            trimmed_pos,
            expire_pos,
            write_pos,
            layout,
        })
    }
}

/// Per-rank record naming the current journal head inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalPointer {
    /// Inode of the journal currently being written.
    pub front: u64,
    /// Inode of a journal being retired, if a swap is in flight.
    pub back: u64,
}

impl JournalPointer {
    /// Name of the pointer object for `rank`.
    pub fn object_name(rank: u64) -> String {
        objects::object_name(objects::pointer_ino(rank), 0)
    }

    /// Serialize into the versioned-block envelope.
    pub fn encode(&self) -> JournalResult<Vec<u8>> {
        let mut payload = Vec::with_capacity(16);
        payload.write_u64::<LittleEndian>(self.front)?;
        payload.write_u64::<LittleEndian>(self.back)?;
        write_envelope(payload)
    }

    /// Decode from the versioned-block envelope.
    pub fn decode(bytes: &[u8]) -> JournalResult<Self> {
        let (mut cur, _payload_len) = read_envelope(bytes, "journal pointer")?;
        Ok(Self {
            front: cur.read_u64::<LittleEndian>().map_err(short_read)?,
            back: cur.read_u64::<LittleEndian>().map_err(short_read)?,
        })
    }

    /// Load the pointer record for `rank` from the store.
    pub fn load(store: &dyn ObjectStore, rank: u64) -> JournalResult<Self> {
        let bytes = store.read_sync(&Self::object_name(rank), 0, u64::MAX)?;
        Self::decode(&bytes)
    }

    /// Persist the pointer record for `rank`.
    pub fn save(&self, store: &dyn ObjectStore, rank: u64) -> JournalResult<()> {
        store.write_full_sync(&Self::object_name(rank), &self.encode()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;

    fn sample_header() -> JournalHeader {
        JournalHeader {
            magic: JOURNAL_MAGIC.to_string(),
            trimmed_pos: 0x40_0000,
            expire_pos: 0x40_0000,
            write_pos: 0x40_0040,
            layout: Some(FileLayout::with_pool(2)),
        }
    }

    #[test]
    fn header_roundtrip() {
        let header = sample_header();
        let decoded = JournalHeader::decode(&header.encode().unwrap()).unwrap();
        assert_eq!(decoded, header);
        assert!(decoded.is_consistent());
    }

    #[test]
    fn header_without_layout_uses_default_object_size() {
        let mut header = sample_header();
        header.layout = None;
        let decoded = JournalHeader::decode(&header.encode().unwrap()).unwrap();
        assert_eq!(decoded.layout, None);
        assert_eq!(decoded.object_size(), u64::from(DEFAULT_OBJECT_SIZE));
    }

    #[test]
    fn zero_object_size_in_layout_uses_default() {
        let mut header = sample_header();
        if let Some(layout) = header.layout.as_mut() {
            layout.object_size = 0;
        }
        assert_eq!(header.object_size(), u64::from(DEFAULT_OBJECT_SIZE));
    }

    #[test]
    fn inconsistent_offsets_are_detected() {
        let mut header = sample_header();
        header.expire_pos = header.write_pos + 1;
        assert!(!header.is_consistent());

        let mut header = sample_header();
        header.trimmed_pos = header.expire_pos + 1;
        assert!(!header.is_consistent());

        let mut header = sample_header();
        header.magic = "not a journal".to_string();
        assert!(!header.is_consistent());
    }

    #[test]
    fn truncated_header_is_a_decode_error() {
        let bytes = sample_header().encode().unwrap();
        for cut in [0, 1, 5, 9, bytes.len() - 1] {
            let err = JournalHeader::decode(&bytes[..cut]).unwrap_err();
            assert!(matches!(err, JournalError::Decode(_)), "cut at {cut}");
        }
    }

    #[test]
    fn pointer_roundtrip_through_store() {
        let store = MemoryObjectStore::new();
        let pointer = JournalPointer {
            front: 0x205,
            back: 0,
        };
        pointer.save(&store, 5).unwrap();
        assert!(store.get("405.00000000").is_some());
        assert_eq!(JournalPointer::load(&store, 5).unwrap(), pointer);
    }

    #[test]
    fn restore_header_covers_the_restored_range() {
        let header = JournalHeader::for_restore(0x40_0000, 64, 2);
        assert!(header.is_consistent());
        assert_eq!(header.trimmed_pos, 0x40_0000);
        assert_eq!(header.expire_pos, 0x40_0000);
        assert_eq!(header.write_pos, 0x40_0040);
        assert_eq!(header.layout.map(|l| l.pool_id), Some(2));
    }
}
