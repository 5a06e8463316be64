use std::hint::black_box;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use trxd_burstgen::capture::{decode_record_from_slice, direction_tag};
use trxd_burstgen::config::ConnMode;
use trxd_burstgen::message::DataMessage;
use trxd_burstgen::sequencer::MessageSequencer;
use trxd_burstgen::{BurstGenerator, BurstType, GenerationRun};

const BURSTS: usize = 200_000;
const MESSAGES: u32 = 100_000;

fn main() {
    for burst_type in BurstType::ALL {
        let (p50_ns, p99_ns) = bench_burst_latency_ns(burst_type);
        println!("burst_{burst_type}_latency_p50_ns={p50_ns:.0}");
        println!("burst_{burst_type}_latency_p99_ns={p99_ns:.0}");
    }

    for conn_mode in [ConnMode::Trx, ConnMode::L1] {
        let mps = bench_build_encode_mps(conn_mode);
        println!("build_encode_{}_msgs_per_sec={mps:.0}", conn_mode.as_label());
    }

    let rps = bench_capture_decode_rps();
    println!("capture_decode_records_per_sec={rps:.0}");
}

fn bench_burst_latency_ns(burst_type: BurstType) -> (f64, f64) {
    let generator = BurstGenerator::default();
    let mut rng = StdRng::seed_from_u64(0x7278_6462);
    let mut latencies_ns = Vec::with_capacity(BURSTS);

    for _ in 0..BURSTS {
        let start = Instant::now();
        black_box(generator.generate(burst_type, &mut rng));
        latencies_ns.push(start.elapsed().as_nanos() as f64);
    }

    latencies_ns.sort_by(|a, b| a.partial_cmp(b).expect("valid float compare"));
    (
        percentile(&latencies_ns, 0.50),
        percentile(&latencies_ns, 0.99),
    )
}

fn bench_build_encode_mps(conn_mode: ConnMode) -> f64 {
    let mut run = GenerationRun::new(BurstType::Normal);
    run.link.conn_mode = conn_mode;
    let mut sequencer =
        MessageSequencer::new(&run, StdRng::seed_from_u64(1)).expect("default run is valid");

    let start = Instant::now();
    for index in 0..MESSAGES {
        black_box(sequencer.build(index).encode());
    }
    f64::from(MESSAGES) / start.elapsed().as_secs_f64()
}

fn bench_capture_decode_rps() -> f64 {
    let run = GenerationRun::new(BurstType::Access);
    let mut sequencer =
        MessageSequencer::new(&run, StdRng::seed_from_u64(2)).expect("default run is valid");
    let mut capture = Vec::new();
    for index in 0..MESSAGES {
        let msg = sequencer.build(index);
        let wire = msg.encode();
        capture.push(direction_tag(msg.direction()));
        capture.extend_from_slice(&(wire.len() as u16).to_be_bytes());
        capture.extend_from_slice(&wire);
    }

    let start = Instant::now();
    let mut rest = capture.as_slice();
    let mut decoded = 0u32;
    while let Ok(record) = decode_record_from_slice(rest) {
        let msg = DataMessage::decode(record.direction, record.payload).expect("valid record");
        black_box(msg);
        decoded += 1;
        rest = &rest[record.consumed_bytes..];
    }
    assert_eq!(decoded, MESSAGES);
    f64::from(decoded) / start.elapsed().as_secs_f64()
}

fn percentile(samples: &[f64], p: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let idx = ((samples.len() - 1) as f64 * p).round() as usize;
    samples[idx.min(samples.len() - 1)]
}
