//! Striped journal inode I/O: range reads/writes and tail recovery.
//!
//! The journal is a linear byte stream laid out across fixed-size objects.
//! `read_range`/`write_range` split a byte range at object boundaries and
//! issue one blocking store operation per span, strictly in program order.
//! `recover` reads the header *strictly* (a damaged header is an error
//! here, unlike in the scanner) and then probes forward for the highest
//! written object, since the persisted `write_pos` is flushed lazily and
//! may trail the true end of the log.

use crate::error::{JournalError, JournalResult};
use crate::formats::FileLayout;
use crate::header::JournalHeader;
use crate::objects;
use crate::store::{BlockingObjectStore, ObjectStore};
use std::sync::Arc;
use tracing::debug;

/// Striped reader/writer for one journal inode.
pub struct Journaler {
    store: Arc<dyn ObjectStore>,
    ino: u64,
    layout: FileLayout,
    header: Option<JournalHeader>,
}

impl Journaler {
    /// Bind to `ino` with an initial layout; `recover` replaces the layout
    /// with the one persisted in the header, when present.
    pub fn new(store: Arc<dyn ObjectStore>, ino: u64, layout: FileLayout) -> Self {
        Self {
            store,
            ino,
            layout,
            header: None,
        }
    }

    /// The layout currently in effect.
    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    /// The header found by [`Journaler::recover`], if it ran.
    pub fn header(&self) -> Option<&JournalHeader> {
        self.header.as_ref()
    }

    /// Recover the replay window, returning `(read_pos, write_pos)`.
    pub fn recover(&mut self) -> JournalResult<(u64, u64)> {
        let header_object = objects::object_name(self.ino, 0);
        let bytes = self.store.read_sync(&header_object, 0, u64::MAX)?;
        let header = JournalHeader::decode(&bytes)?;
        if !header.is_consistent() {
            return Err(JournalError::Format(format!(
                "journal header for inode {:#x} is inconsistent",
                self.ino
            )));
        }
        if let Some(layout) = header.layout {
            self.layout = layout;
        }

        let object_size = self.object_size();
        let mut write_pos = header.write_pos;
        let mut index = write_pos / object_size;
        loop {
            let name = objects::object_name(self.ino, index);
            match self.store.read_sync(&name, 0, u64::MAX) {
                Ok(bytes) => {
                    let end = index * object_size + bytes.len() as u64;
                    if end > write_pos {
                        write_pos = end;
                    }
                    index += 1;
                }
                Err(JournalError::ObjectMissing(_)) => break,
                Err(e) => return Err(e),
            }
        }

        let read_pos = header.expire_pos;
        debug!(read_pos, write_pos, ino = self.ino, "journal recovered");
        self.header = Some(header);
        Ok((read_pos, write_pos))
    }

    /// Read `len` journal bytes starting at absolute `offset`.
    ///
    /// Every byte must be present; a short object turns into a
    /// [`JournalError::Format`] rather than silent truncation.
    pub fn read_range(&self, offset: u64, len: u64) -> JournalResult<Vec<u8>> {
        let object_size = self.object_size();
        let end = offset
            .checked_add(len)
            .ok_or_else(|| JournalError::InvalidConfig("read range overflows".into()))?;
        let mut out = Vec::with_capacity(len as usize);
        let mut pos = offset;
        while pos < end {
            let index = pos / object_size;
            let intra = pos % object_size;
            let take = (object_size - intra).min(end - pos);
            let name = objects::object_name(self.ino, index);
            let bytes = self.store.read_sync(&name, intra, take)?;
            if (bytes.len() as u64) < take {
                return Err(JournalError::Format(format!(
                    "short read at {pos:#x}: wanted {take} bytes from {name}, got {}",
                    bytes.len()
                )));
            }
            out.extend_from_slice(&bytes);
            pos += take;
        }
        Ok(out)
    }

    /// Write `data` into the journal starting at absolute `offset`.
    ///
    /// Writes are split at object boundaries and issued one at a time;
    /// each span is acknowledged before the next is submitted.
    pub fn write_range(&self, offset: u64, data: &[u8]) -> JournalResult<()> {
        let object_size = self.object_size();
        let mut pos = offset;
        let mut rest = data;
        while !rest.is_empty() {
            let index = pos / object_size;
            let intra = pos % object_size;
            let take = ((object_size - intra).min(rest.len() as u64)) as usize;
            let name = objects::object_name(self.ino, index);
            self.store.write_sync(&name, intra, &rest[..take])?;
            pos += take as u64;
            rest = &rest[take..];
        }
        Ok(())
    }

    fn object_size(&self) -> u64 {
        self.layout.object_size_or_default()
    }
}
