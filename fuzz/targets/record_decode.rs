#![no_main]

use aura_bus::{MessageRecord, RecordHandle};
use libfuzzer_sys::fuzz_target;

// Чужие и обрезанные файлы в ящике должны давать ошибку, а не панику.
fuzz_target!(|data: &[u8]| {
    if let Ok(record) = MessageRecord::decode(data, "fuzz.rec") {
        let bytes = record.encode().expect("decoded record encodes back");
        let again = MessageRecord::decode(&bytes, "fuzz.rec").expect("re-encoded record decodes");
        assert_eq!(again.message_id, record.message_id);
        assert_eq!(again.topic, record.topic);
    }

    if let Ok(name) = std::str::from_utf8(data) {
        if let Some(handle) = RecordHandle::parse(name) {
            assert_eq!(handle.name(), name);
        }
    }
});
