#![no_main]

use libfuzzer_sys::fuzz_target;
use rand::rngs::StdRng;
use rand::SeedableRng;
use trxd_burstgen::config::ConnMode;
use trxd_burstgen::message::DataMessage;
use trxd_burstgen::sequencer::MessageSequencer;
use trxd_burstgen::{BurstType, GenerationRun};

fuzz_target!(|data: &[u8]| {
    if data.len() < 10 {
        return;
    }

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&data[..8]);
    let burst_type = BurstType::ALL[usize::from(data[8]) % BurstType::ALL.len()];

    let mut run = GenerationRun::new(burst_type);
    run.tsc = data[9] % 8;
    if data[9] & 0x80 != 0 {
        run.link.conn_mode = ConnMode::L1;
    }

    let rng = StdRng::seed_from_u64(u64::from_le_bytes(seed));
    let mut sequencer = MessageSequencer::new(&run, rng).expect("tsc below 8 is valid");
    for index in 0..4 {
        let msg = sequencer.build(index);
        let wire = msg.encode();
        assert_eq!(wire.len(), msg.direction().message_len());

        let decoded =
            DataMessage::decode(msg.direction(), &wire).expect("generated message decodes");
        assert_eq!(decoded.hard_bits(), msg.hard_bits());
        assert_eq!(decoded.header().frame_number(), msg.header().frame_number());
        assert_eq!(decoded.header().timeslot(), msg.header().timeslot());
    }
});
