//! `journal-forensics`: offline tooling for damaged metadata-server journals.
//!
//! Scope:
//! - object addressing for striped journal objects (`objects`)
//! - damage-tolerant journal scanning (`scanner`)
//! - byte-exact dump/restore through a sparse local file (`dumper`)
//! - event selection and output (`output`)
//!
//! Non-goal: talking to a live cluster. All I/O goes through the injected
//! [`store::ObjectStore`] capability; [`store::MemoryObjectStore`] and
//! [`store::FsObjectStore`] are the in-tree implementations.
//!
//! ## Contract (what you can rely on)
//!
//! - [`scanner::JournalScanner::scan`] errors only when the object store
//!   itself is unusable. A corrupt header, missing objects, and framing
//!   damage are *findings*, recorded on the scan result; the call still
//!   succeeds. Forensics on a broken journal is the point.
//! - Scan results are self-consistent: event offsets are strictly
//!   increasing, every stored event's offset also appears in
//!   `events_valid`, and invalid ranges use `u64::MAX` as an end to mean
//!   "ran to the end of the journal".
//! - [`dumper::Dumper::dump`] followed by [`dumper::Dumper::undump`]
//!   round-trips the live byte range exactly, and rewrites the header so
//!   a subsequent replay starts from the restored region.

pub mod completion;
pub mod dumper;
pub mod error;
pub mod events;
pub mod formats;
pub mod header;
pub mod journaler;
pub mod objects;
pub mod output;
pub mod scanner;
pub mod store;

pub use dumper::Dumper;
pub use error::{JournalError, JournalResult};
pub use events::{EventDecoder, LogEvent, LogEventRegistry};
pub use header::{JournalHeader, JournalPointer};
pub use output::{EventSelector, OutputMode};
pub use scanner::JournalScanner;
pub use store::{FsObjectStore, MemoryObjectStore, ObjectStore};
