//! Byte-exact journal export and restore through a sparse local file.
//!
//! A dump file is a 200-byte human-readable preamble followed by the raw
//! journal bytes written at *their own* absolute offsets: the dumper seeks
//! to the journal's start offset before writing the payload, leaving the
//! region between the preamble and the payload as a hole. The file's
//! on-disk extents therefore mirror the original journal layout, and the
//! preamble records where the payload begins.
//!
//! Restore rewrites the segment-0 header (fresh, covering exactly the
//! dumped range) and streams the payload back through the striped writer
//! in chunks, one write in flight at a time. Partial failures leave the
//! journal inconsistent; this is a repair tool and the MDS must be
//! stopped first.

use crate::error::{JournalError, JournalResult};
use crate::formats::{FileLayout, UNDUMP_CHUNK_BYTES};
use crate::header::{JournalHeader, JournalPointer};
use crate::journaler::Journaler;
use crate::objects;
use crate::store::{BlockingObjectStore, ObjectStore};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Size of the fixed dump-file preamble.
pub const PREAMBLE_BYTES: usize = 200;

/// Exports and restores the live journal region of one rank.
pub struct Dumper {
    store: Arc<dyn ObjectStore>,
    pool_id: i64,
    rank: u64,
    ino: u64,
}

impl Dumper {
    /// Dumper over `store`, writing to / reading from pool `pool_id`.
    pub fn new(store: Arc<dyn ObjectStore>, pool_id: i64) -> Self {
        Self {
            store,
            pool_id,
            rank: 0,
            ino: 0,
        }
    }

    /// Bind to `rank`'s current journal inode via the journal pointer.
    ///
    /// A pool with no pointer record (e.g. a fresh restore target) binds
    /// to the rank's well-known log inode instead; any other pointer load
    /// failure propagates.
    pub fn init(&mut self, rank: u64) -> JournalResult<()> {
        self.store.connect()?;
        self.store.pool_reverse_lookup(self.pool_id)?;
        self.rank = rank;
        self.ino = match JournalPointer::load(self.store.as_ref(), rank) {
            Ok(pointer) => pointer.front,
            Err(JournalError::ObjectMissing(_)) => objects::log_ino(rank),
            Err(e) => return Err(e),
        };
        debug!(rank, ino = self.ino, "dumper bound to journal inode");
        Ok(())
    }

    /// The journal inode this dumper is bound to.
    pub fn ino(&self) -> u64 {
        self.ino
    }

    /// Export the live journal region to a sparse file at `path`.
    pub fn dump(&self, path: &Path) -> JournalResult<()> {
        self.check_bound()?;
        let mut journaler = Journaler::new(
            self.store.clone(),
            self.ino,
            FileLayout::with_pool(self.pool_id),
        );
        let (start, write_pos) = journaler.recover()?;
        let len = write_pos - start;
        info!(start, len, "journal is {start}~{len}");
        if start < PREAMBLE_BYTES as u64 {
            return Err(JournalError::DumpFormat(format!(
                "journal starts at {start}, inside the preamble region"
            )));
        }

        let payload = journaler.read_range(start, len)?;

        let mut file = File::create(path)?;
        file.write_all(&preamble(self.rank, start, len))?;
        file.seek(SeekFrom::Start(start))?;
        file.write_all(&payload)?;
        file.sync_all()?;

        info!(
            bytes = payload.len(),
            path = %path.display(),
            "journal dumped (sparse file; payload sits at its journal offset)"
        );
        Ok(())
    }

    /// Restore the live journal region from a dump file at `path`.
    pub fn undump(&self, path: &Path) -> JournalResult<()> {
        self.check_bound()?;
        let mut file = File::open(path)?;
        let mut pre = [0u8; PREAMBLE_BYTES];
        file.read_exact(&mut pre)?;
        let (start, len) = parse_preamble(&pre)?;
        info!(start, len, "restoring journal");

        // Fresh header: the restored region is exactly the live range.
        let header = JournalHeader::for_restore(start, len, self.pool_id);
        let header_object = objects::object_name(self.ino, 0);
        self.store
            .write_full_sync(&header_object, &header.encode()?)?;

        let journaler = Journaler::new(
            self.store.clone(),
            self.ino,
            FileLayout::with_pool(self.pool_id),
        );
        file.seek(SeekFrom::Start(start))?;
        let mut chunk = vec![0u8; UNDUMP_CHUNK_BYTES];
        let mut pos = start;
        let mut left = len;
        while left > 0 {
            let take = (UNDUMP_CHUNK_BYTES as u64).min(left) as usize;
            file.read_exact(&mut chunk[..take])?;
            journaler.write_range(pos, &chunk[..take])?;
            debug!(pos, bytes = take, "restored chunk");
            pos += take as u64;
            left -= take as u64;
        }

        info!("journal restored");
        Ok(())
    }

    fn check_bound(&self) -> JournalResult<()> {
        if self.ino == 0 {
            return Err(JournalError::InvalidConfig(
                "dumper is not bound to a rank; call init first".into(),
            ));
        }
        Ok(())
    }
}

fn preamble(rank: u64, start: u64, len: u64) -> [u8; PREAMBLE_BYTES] {
    let mut out = [0u8; PREAMBLE_BYTES];
    let text = format!(
        "rank {rank} journal dump\n start offset {start} (0x{start:x})\n       length {len} (0x{len:x})\n\x04"
    );
    let n = text.len().min(PREAMBLE_BYTES);
    out[..n].copy_from_slice(&text.as_bytes()[..n]);
    out
}

/// Parse `start offset` and `length` from a dump-file preamble.
///
/// Tolerant of surrounding whitespace; values are decimal.
fn parse_preamble(pre: &[u8]) -> JournalResult<(u64, u64)> {
    let text = String::from_utf8_lossy(pre);
    let start = field_value(&text, "start offset")
        .ok_or_else(|| JournalError::DumpFormat("no start offset field".into()))?;
    let len = field_value(&text, "length")
        .ok_or_else(|| JournalError::DumpFormat("no length field".into()))?;
    Ok((start, len))
}

fn field_value(text: &str, field: &str) -> Option<u64> {
    let at = text.find(field)?;
    let rest = text[at + field.len()..].trim_start();
    let digits: &str = rest
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .filter(|s| !s.is_empty())?;
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_states_offsets_in_decimal_and_hex() {
        let pre = preamble(0, 4_194_304, 64);
        let text = String::from_utf8_lossy(&pre);
        assert!(text.contains("start offset 4194304 (0x400000)"));
        assert!(text.contains("length 64 (0x40)"));
        assert!(pre.contains(&0x04));
        assert_eq!(pre.len(), PREAMBLE_BYTES);
    }

    #[test]
    fn preamble_roundtrips_through_the_parser() {
        let pre = preamble(3, 12_582_912, 1_097_504);
        assert_eq!(parse_preamble(&pre).unwrap(), (12_582_912, 1_097_504));
    }

    #[test]
    fn parser_tolerates_ragged_whitespace() {
        let mut pre = [0u8; PREAMBLE_BYTES];
        let text = "mds journal\n start offset   123\n\n  length \t 456\n\x04";
        pre[..text.len()].copy_from_slice(text.as_bytes());
        assert_eq!(parse_preamble(&pre).unwrap(), (123, 456));
    }

    #[test]
    fn parser_rejects_a_preamble_with_missing_fields() {
        let mut pre = [0u8; PREAMBLE_BYTES];
        let text = "not a dump file\n";
        pre[..text.len()].copy_from_slice(text.as_bytes());
        assert!(matches!(
            parse_preamble(&pre).unwrap_err(),
            JournalError::DumpFormat(_)
        ));
    }

    #[test]
    fn unbound_dumper_refuses_to_run() {
        let store = Arc::new(crate::store::MemoryObjectStore::new());
        let dumper = Dumper::new(store, 2);
        assert!(matches!(
            dumper.dump(Path::new("/tmp/never-written")).unwrap_err(),
            JournalError::InvalidConfig(_)
        ));
    }
}
