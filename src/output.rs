//! Event selection and output.
//!
//! A selector narrows the event stream; its fields compose with logical
//! AND and an empty selector accepts everything. `into_predicate` turns a
//! selector into the scanner's filtering hook, so filtering happens while
//! the walk runs rather than after.
//!
//! Three mutually exclusive output modes:
//! - **summary**: one `"0x<offset> <type>: <path>"` line per event
//! - **binary**: one `0x<offset>_<type>.bin` file per event, containing
//!   the event's re-encoded payload (no journal framing)
//! - **json**: a single top-level array of `{offset, type, ...}` records

use crate::error::{JournalError, JournalResult};
use crate::events::LogEvent;
use crate::scanner::EventFilter;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Structured event selector.
#[derive(Debug, Clone, Default)]
pub struct EventSelector {
    /// Keep only events of this type name (e.g. `"EUpdate"`).
    pub by_type: Option<String>,
    /// Keep only events referencing this inode.
    pub by_inode: Option<u64>,
    /// Keep only events whose path equals this exactly.
    pub by_path: Option<String>,
    /// Keep only events whose path lies under this tree.
    pub by_tree: Option<String>,
    /// Keep only events whose journal offset lies in `[start, end)`.
    pub by_range: Option<(u64, u64)>,
    /// Keep only update events touching this (dirfrag, dentry name) pair.
    pub by_dirfrag_name: Option<(u64, String)>,
}

impl EventSelector {
    /// Whether no criteria are set (accepts every event).
    pub fn is_empty(&self) -> bool {
        self.by_type.is_none()
            && self.by_inode.is_none()
            && self.by_path.is_none()
            && self.by_tree.is_none()
            && self.by_range.is_none()
            && self.by_dirfrag_name.is_none()
    }

    /// Whether the event at `offset` satisfies every set criterion.
    pub fn accepts(&self, offset: u64, event: &LogEvent) -> bool {
        if let Some(wanted) = &self.by_type {
            if event.type_name() != wanted {
                return false;
            }
        }
        if let Some(ino) = self.by_inode {
            if !event.references_ino(ino) {
                return false;
            }
        }
        if let Some(wanted) = &self.by_path {
            if event.path() != Some(wanted.as_str()) {
                return false;
            }
        }
        if let Some(tree) = &self.by_tree {
            match event.path() {
                Some(path) if path_under(path, tree) => {}
                _ => return false,
            }
        }
        if let Some((start, end)) = self.by_range {
            if offset < start || offset >= end {
                return false;
            }
        }
        if let Some((wanted_frag, wanted_name)) = &self.by_dirfrag_name {
            match event {
                LogEvent::Update {
                    dirfrag, dentry, ..
                } if dirfrag == wanted_frag && dentry == wanted_name => {}
                _ => return false,
            }
        }
        true
    }

    /// The scanner predicate form of this selector.
    pub fn into_predicate(self) -> EventFilter {
        Box::new(move |offset, event| self.accepts(offset, event))
    }
}

fn path_under(path: &str, tree: &str) -> bool {
    path == tree
        || path
            .strip_prefix(tree)
            .is_some_and(|rest| tree.ends_with('/') || rest.starts_with('/'))
}

/// Output modes for event extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// One textual line per event.
    Summary,
    /// One binary file per event under a directory.
    Binary,
    /// A JSON array of structured records.
    Json,
}

/// Emit `events` in `mode`. `out` receives summary/json text; `binary_dir`
/// is where binary mode writes its files.
pub fn emit<W: Write>(
    events: &BTreeMap<u64, LogEvent>,
    mode: OutputMode,
    out: &mut W,
    binary_dir: &Path,
) -> JournalResult<()> {
    match mode {
        OutputMode::Summary => emit_summary(events, out),
        OutputMode::Binary => emit_binary(events, binary_dir),
        OutputMode::Json => emit_json(events, out),
    }
}

/// Write one `"0x<offset> <type>: <path>"` line per event.
///
/// Events without a path get an empty path column, matching the summary
/// format scripts already parse.
pub fn emit_summary<W: Write>(events: &BTreeMap<u64, LogEvent>, out: &mut W) -> JournalResult<()> {
    for (offset, event) in events {
        writeln!(
            out,
            "{offset:#x} {}: {}",
            event.type_name(),
            event.path().unwrap_or("")
        )?;
    }
    Ok(())
}

/// Write each event's re-encoded payload to `dir/0x<offset>_<type>.bin`.
///
/// The directory is created if absent. The files contain the event
/// payload only, not the journal framing.
pub fn emit_binary(events: &BTreeMap<u64, LogEvent>, dir: &Path) -> JournalResult<()> {
    std::fs::create_dir_all(dir)?;
    for (offset, event) in events {
        let name = format!("{offset:#x}_{}.bin", event.type_name());
        std::fs::write(dir.join(name), event.encode()?)?;
    }
    Ok(())
}

/// Write all events as a single JSON array of `{offset, type, ...}`
/// records, one per event, type-specific fields flattened in.
pub fn emit_json<W: Write>(events: &BTreeMap<u64, LogEvent>, out: &mut W) -> JournalResult<()> {
    let records: Vec<serde_json::Value> = events
        .iter()
        .map(|(offset, event)| event_record(*offset, event))
        .collect();
    serde_json::to_writer_pretty(&mut *out, &records)
        .map_err(|e| JournalError::Encode(e.to_string()))?;
    writeln!(out)?;
    Ok(())
}

fn event_record(offset: u64, event: &LogEvent) -> serde_json::Value {
    let mut record = match event {
        LogEvent::Session { client_id, open } => json!({
            "client_id": client_id,
            "open": open,
        }),
        LogEvent::SubtreeMap { subtrees } => json!({ "subtrees": subtrees }),
        LogEvent::Update {
            path,
            ino,
            dirfrag,
            dentry,
        } => json!({
            "path": path,
            "ino": ino,
            "dirfrag": dirfrag,
            "dentry": dentry,
        }),
        LogEvent::Open { inos } => json!({ "inos": inos }),
        LogEvent::Committed { reqid } => json!({ "reqid": reqid }),
        LogEvent::NoOp => json!({}),
        LogEvent::Unknown { type_tag, bytes } => json!({
            "type_tag": type_tag,
            "length": bytes.len(),
        }),
    };
    if let Some(map) = record.as_object_mut() {
        map.insert("offset".into(), json!(offset));
        map.insert("type".into(), json!(event.type_name()));
    }
    record
}
