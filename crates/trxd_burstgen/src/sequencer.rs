use anyhow::{Context, Result};
use rand::Rng;

use crate::burst::BurstGenerator;
use crate::config::GenerationRun;
use crate::message::{
    frame_number_at, ubit_to_sbit, DataMessage, DownlinkMessage, LinkDirection, UplinkMessage,
    GSM_HYPERFRAME, PWR_RANDOM_RANGE, RSSI_RANDOM_RANGE, TOA256_RANDOM_RANGE, TRX_TIMESLOTS,
};

/// Builds the messages of a run: frame numbers advance from a single
/// starting point, pinned fields are copied, everything else is drawn fresh.
pub struct MessageSequencer<'a, R> {
    run: &'a GenerationRun,
    generator: BurstGenerator,
    fn_init: u32,
    rng: R,
}

impl<'a, R: Rng> MessageSequencer<'a, R> {
    /// Fails when `run` does not pass [`GenerationRun::validate`], so every
    /// message built afterwards has in-range header fields.
    pub fn new(run: &'a GenerationRun, mut rng: R) -> Result<Self> {
        run.validate()?;
        let generator = BurstGenerator::with_tsc(run.tsc)
            .with_context(|| format!("unknown training sequence code {}", run.tsc))?;
        let fn_init = run
            .overrides
            .frame_number
            .unwrap_or_else(|| rng.gen_range(0..GSM_HYPERFRAME));
        Ok(Self {
            run,
            generator,
            fn_init,
            rng,
        })
    }

    pub fn fn_init(&self) -> u32 {
        self.fn_init
    }

    pub fn build(&mut self, index: u32) -> DataMessage {
        let overrides = &self.run.overrides;
        let rng = &mut self.rng;

        let frame_number = frame_number_at(self.fn_init, index);
        let timeslot = overrides
            .timeslot
            .unwrap_or_else(|| rng.gen_range(0..TRX_TIMESLOTS));
        let toa256 = overrides
            .toa256
            .unwrap_or_else(|| rng.gen_range(TOA256_RANDOM_RANGE));
        let bits = self.generator.generate(self.run.burst_type, rng);

        match self.run.direction() {
            LinkDirection::L1ToTrx => DataMessage::Downlink(DownlinkMessage {
                frame_number,
                timeslot,
                pwr: overrides
                    .pwr
                    .unwrap_or_else(|| rng.gen_range(PWR_RANDOM_RANGE)),
                toa256,
                burst: bits,
            }),
            LinkDirection::TrxToL1 => DataMessage::Uplink(UplinkMessage {
                frame_number,
                timeslot,
                rssi: overrides
                    .rssi
                    .unwrap_or_else(|| rng.gen_range(RSSI_RANDOM_RANGE)),
                toa256,
                burst: ubit_to_sbit(&bits),
            }),
        }
    }
}
