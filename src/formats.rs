//! On-disk format constants and the striping layout descriptor.

/// Magic string carried by every journal header.
pub const JOURNAL_MAGIC: &str = "ceph fs volume v011";

/// 64-bit sentinel marking the start of every framed event (little-endian).
pub const EVENT_SENTINEL: u64 = 0xFEED_FACE_DEAD_BEEF;

/// Inode base for per-rank journals (`ino = LOG_INO_BASE + rank`).
pub const LOG_INO_BASE: u64 = 0x200;

/// Inode base for per-rank journal-pointer records.
pub const POINTER_INO_BASE: u64 = 0x400;

/// Object size used when the header carries no layout, or a zero one.
pub const DEFAULT_OBJECT_SIZE: u32 = 4 << 20;

/// Maximum bytes per striped write issued during a restore.
pub const UNDUMP_CHUNK_BYTES: usize = 1 << 20;

/// Envelope version written by this code for persisted bookkeeping records.
pub const STRUCT_VERSION: u8 = 1;
/// Oldest envelope version that can still decode records we write.
pub const COMPAT_VERSION: u8 = 1;

/// Framing bytes around one event payload: sentinel + size + back-pointer.
pub const FRAME_OVERHEAD: u64 = 8 + 4 + 8;

/// Striping descriptor from the journal header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLayout {
    /// Stripe unit in bytes.
    pub stripe_unit: u32,
    /// Number of objects striped across.
    pub stripe_count: u32,
    /// Bytes of journal per object.
    pub object_size: u32,
    /// Pool holding the journal objects.
    pub pool_id: i64,
}

impl FileLayout {
    /// The well-known default layout with `pool_id` substituted in.
    pub fn with_pool(pool_id: i64) -> Self {
        Self {
            stripe_unit: DEFAULT_OBJECT_SIZE,
            stripe_count: 1,
            object_size: DEFAULT_OBJECT_SIZE,
            pool_id,
        }
    }

    /// Object size in bytes, substituting the default for zero.
    pub fn object_size_or_default(&self) -> u64 {
        if self.object_size == 0 {
            u64::from(DEFAULT_OBJECT_SIZE)
        } else {
            u64::from(self.object_size)
        }
    }
}
