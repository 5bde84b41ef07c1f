#![no_main]

use journal_forensics::formats::{FileLayout, JOURNAL_MAGIC};
use journal_forensics::header::JournalHeader;
use journal_forensics::scanner::JournalScanner;
use journal_forensics::store::{BlockingObjectStore, MemoryObjectStore};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

const OBJECT_SIZE: u32 = 256;

// Arbitrary bytes as segment payloads must never panic the walker, and
// whatever it reports must stay self-consistent.
fuzz_target!(|data: &[u8]| {
    let store = MemoryObjectStore::with_pool(2, "metadata");
    let object_size = u64::from(OBJECT_SIZE);

    let expire = object_size;
    let write = expire + data.len() as u64;
    let header = JournalHeader {
        magic: JOURNAL_MAGIC.to_string(),
        trimmed_pos: expire,
        expire_pos: expire,
        write_pos: write,
        layout: Some(FileLayout {
            stripe_unit: OBJECT_SIZE,
            stripe_count: 1,
            object_size: OBJECT_SIZE,
            pool_id: 2,
        }),
    };
    store
        .write_full_sync("200.00000000", &header.encode().unwrap())
        .unwrap();

    for (i, chunk) in data.chunks(OBJECT_SIZE as usize).enumerate() {
        let name = format!("{:x}.{:08x}", 0x200, i as u64 + 1);
        store.write_full_sync(&name, chunk).unwrap();
    }

    let mut scanner = JournalScanner::new(Arc::new(store), 0, 2);
    scanner.scan().unwrap();

    let keys: Vec<u64> = scanner.events.keys().copied().collect();
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
    for key in &keys {
        assert!(scanner.events_valid.contains(key));
        assert!(*key >= expire && *key < write);
    }
});
