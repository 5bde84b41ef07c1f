//! Object addressing: journal byte offsets to object-store names.
//!
//! Names are `"<ino-hex>.<segment-index-hex-8>"`, inode at minimum width
//! and segment index zero-padded to eight digits, both lowercase. The
//! second component is the segment index `byte_offset / object_size`,
//! not a byte offset; the header lives in segment 0. No I/O here.

use crate::formats::{LOG_INO_BASE, POINTER_INO_BASE};

/// Inode of the journal belonging to `rank`.
pub fn log_ino(rank: u64) -> u64 {
    LOG_INO_BASE + rank
}

/// Inode of the journal-pointer record belonging to `rank`.
pub fn pointer_ino(rank: u64) -> u64 {
    POINTER_INO_BASE + rank
}

/// Name of the object holding segment `segment_index` of inode `ino`.
pub fn object_name(ino: u64, segment_index: u64) -> String {
    format!("{ino:x}.{segment_index:08x}")
}

/// Name of the segment object containing absolute byte offset `offset`.
pub fn object_for_offset(ino: u64, offset: u64, object_size: u64) -> String {
    object_name(ino, offset / object_size)
}
