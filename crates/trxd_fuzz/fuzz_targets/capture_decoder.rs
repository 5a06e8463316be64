#![no_main]

use libfuzzer_sys::fuzz_target;
use trxd_burstgen::capture::{decode_record_from_slice, CaptureRecord};
use trxd_burstgen::message::{DataMessage, LinkDirection};

fuzz_target!(|data: &[u8]| {
    let mut rest = data;
    while let Ok(record) = decode_record_from_slice(rest) {
        assert!(record.consumed_bytes > 0 && record.consumed_bytes <= rest.len());

        let owned = CaptureRecord {
            direction: record.direction,
            payload: record.payload.to_vec(),
        };
        if let Ok(msg) = owned.decode_message() {
            assert_eq!(msg.direction(), record.direction);
            assert_eq!(msg.hard_bits().len(), 148);
            if record.direction == LinkDirection::L1ToTrx {
                assert_eq!(msg.encode(), record.payload);
            }
            let _ = DataMessage::decode(record.direction, &msg.encode());
        }

        rest = &rest[record.consumed_bytes..];
    }
});
