#![no_main]

use journal_forensics::header::{JournalHeader, JournalPointer};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = JournalHeader::decode(data);
    let _ = JournalPointer::decode(data);
});
