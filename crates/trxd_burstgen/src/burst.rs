use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use rand::Rng;
use serde::Deserialize;

/// Every burst, whatever its type, is carried as 148 hard bits.
pub const GSM_BURST_LEN: usize = 148;

/// Number of normal-burst training sequences defined by GSM 05.02.
pub const NB_TSC_COUNT: usize = 8;

// GSM 05.02 section 5.2.3, training sequence codes 0..=7.
pub const NB_TSC_LIST: [[u8; 26]; NB_TSC_COUNT] = [
    [
        0, 0, 1, 0, 0, 1, 0, 1, 1, 1, 0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 1, 0, 1, 1, 1,
    ],
    [
        0, 0, 1, 0, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 1, 1, 0, 1, 1, 1,
    ],
    [
        0, 1, 0, 0, 0, 0, 1, 1, 1, 0, 1, 1, 1, 0, 1, 0, 0, 1, 0, 0, 0, 0, 1, 1, 1, 0,
    ],
    [
        0, 1, 0, 0, 0, 1, 1, 1, 1, 0, 1, 1, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 1, 1, 1, 0,
    ],
    [
        0, 0, 0, 1, 1, 0, 1, 0, 1, 1, 1, 0, 0, 1, 0, 0, 0, 0, 0, 1, 1, 0, 1, 0, 1, 1,
    ],
    [
        0, 1, 0, 0, 1, 1, 1, 0, 1, 0, 1, 1, 0, 0, 0, 0, 0, 1, 0, 0, 1, 1, 1, 0, 1, 0,
    ],
    [
        1, 0, 1, 0, 0, 1, 1, 1, 1, 1, 0, 1, 1, 0, 0, 0, 1, 0, 1, 0, 0, 1, 1, 1, 1, 1,
    ],
    [
        1, 1, 1, 0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1, 0, 1, 1, 1, 0, 1, 1, 1, 1, 0, 0,
    ],
];

// GSM 05.02 section 5.2.5, extended training sequence of the synchronization burst.
pub const SB_TRAINING_SEQ: [u8; 64] = [
    1, 0, 1, 1, 1, 0, 0, 1, 0, 1, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 1, 1, 1,
    1, 0, 0, 1, 0, 1, 1, 0, 1, 0, 1, 0, 0, 0, 1, 0, 1, 0, 1, 1, 1, 0, 1, 1, 0, 0, 0, 0, 1, 1, 0,
    1, 1,
];

// GSM 05.02 section 5.2.7, synchronization sequence of the access burst.
pub const AB_SYNC_SEQ: [u8; 41] = [
    0, 1, 0, 0, 1, 0, 1, 1, 0, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 1, 0, 1, 0, 1,
    0, 0, 0, 1, 1, 1, 1, 0, 0, 0,
];

pub const AB_EXTENDED_TAIL: [u8; 8] = [0, 0, 1, 1, 1, 0, 1, 0];

// NB: tail(3) data(57) steal(1) | TSC(26) | steal(1) data(57) tail(3)
const NB_TSC_OFFSET: usize = 61;
const NB_RANDOM_REGIONS: &[Range<usize>] = &[3..61, 87..145];
// FB is all zeros.
const FB_RANDOM_REGIONS: &[Range<usize>] = &[];
// SB: tail(3) data(39) | training(64) | data(39) tail(3)
const SB_TRAINING_OFFSET: usize = 42;
const SB_RANDOM_REGIONS: &[Range<usize>] = &[3..42, 106..145];
// AB: extended tail(8) | sync(41) | data(36) tail(3) guard(60)
const AB_SYNC_OFFSET: usize = 8;
const AB_RANDOM_REGIONS: &[Range<usize>] = &[49..85];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum BurstType {
    #[serde(rename = "NB")]
    Normal,
    #[serde(rename = "FB")]
    FrequencyCorrection,
    #[serde(rename = "SB")]
    Synchronization,
    #[serde(rename = "AB")]
    Access,
}

impl BurstType {
    pub const ALL: [BurstType; 4] = [
        Self::Normal,
        Self::FrequencyCorrection,
        Self::Synchronization,
        Self::Access,
    ];

    pub fn as_label(self) -> &'static str {
        match self {
            Self::Normal => "NB",
            Self::FrequencyCorrection => "FB",
            Self::Synchronization => "SB",
            Self::Access => "AB",
        }
    }

    /// Bit ranges that are re-drawn on every generation. Everything outside
    /// these ranges is the fixed skeleton of the burst.
    pub fn random_regions(self) -> &'static [Range<usize>] {
        match self {
            Self::Normal => NB_RANDOM_REGIONS,
            Self::FrequencyCorrection => FB_RANDOM_REGIONS,
            Self::Synchronization => SB_RANDOM_REGIONS,
            Self::Access => AB_RANDOM_REGIONS,
        }
    }

    pub fn is_random_bit(self, index: usize) -> bool {
        self.random_regions()
            .iter()
            .any(|region| region.contains(&index))
    }
}

impl fmt::Display for BurstType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl FromStr for BurstType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NB" => Ok(Self::Normal),
            "FB" => Ok(Self::FrequencyCorrection),
            "SB" => Ok(Self::Synchronization),
            "AB" => Ok(Self::Access),
            other => Err(format!("unknown burst type {other:?} (expected NB, FB, SB or AB)")),
        }
    }
}

/// Produces physically shaped random bursts as hard bits (one `0`/`1` per byte).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BurstGenerator {
    tsc: usize,
}

impl BurstGenerator {
    /// Generator whose normal bursts carry training sequence `tsc`.
    /// Returns `None` when `tsc` is not one of the eight defined codes.
    pub fn with_tsc(tsc: u8) -> Option<Self> {
        let tsc = usize::from(tsc);
        (tsc < NB_TSC_COUNT).then_some(Self { tsc })
    }

    pub fn tsc(&self) -> u8 {
        self.tsc as u8
    }

    pub fn generate<R: Rng + ?Sized>(&self, burst_type: BurstType, rng: &mut R) -> Vec<u8> {
        let mut bits = self.skeleton(burst_type);
        for region in burst_type.random_regions() {
            for bit in &mut bits[region.clone()] {
                *bit = rng.gen_range(0..=1);
            }
        }
        bits
    }

    /// The constant part of a burst with every random bit cleared.
    pub fn skeleton(&self, burst_type: BurstType) -> Vec<u8> {
        let mut bits = vec![0u8; GSM_BURST_LEN];
        match burst_type {
            BurstType::Normal => {
                bits[NB_TSC_OFFSET..NB_TSC_OFFSET + 26].copy_from_slice(&NB_TSC_LIST[self.tsc]);
            }
            BurstType::FrequencyCorrection => {}
            BurstType::Synchronization => {
                bits[SB_TRAINING_OFFSET..SB_TRAINING_OFFSET + SB_TRAINING_SEQ.len()]
                    .copy_from_slice(&SB_TRAINING_SEQ);
            }
            BurstType::Access => {
                bits[..AB_EXTENDED_TAIL.len()].copy_from_slice(&AB_EXTENDED_TAIL);
                bits[AB_SYNC_OFFSET..AB_SYNC_OFFSET + AB_SYNC_SEQ.len()]
                    .copy_from_slice(&AB_SYNC_SEQ);
            }
        }
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const ROUNDS: usize = 1000;

    #[test]
    fn random_regions_stay_inside_the_burst() {
        for burst_type in BurstType::ALL {
            for region in burst_type.random_regions() {
                assert!(region.end <= GSM_BURST_LEN, "{burst_type}: {region:?}");
                assert!(region.start < region.end, "{burst_type}: {region:?}");
            }
        }
    }

    #[test]
    fn constant_bits_never_change_and_random_bits_do() {
        let generator = BurstGenerator::default();
        let mut rng = StdRng::seed_from_u64(0x7258);

        for burst_type in BurstType::ALL {
            let skeleton = generator.skeleton(burst_type);
            let mut seen_one = vec![false; GSM_BURST_LEN];
            let mut seen_zero = vec![false; GSM_BURST_LEN];

            for _ in 0..ROUNDS {
                let bits = generator.generate(burst_type, &mut rng);
                assert_eq!(bits.len(), GSM_BURST_LEN);
                for (index, &bit) in bits.iter().enumerate() {
                    assert!(bit <= 1, "{burst_type} bit {index} is not a hard bit");
                    if !burst_type.is_random_bit(index) {
                        assert_eq!(bit, skeleton[index], "{burst_type} constant bit {index}");
                    }
                    if bit == 1 {
                        seen_one[index] = true;
                    } else {
                        seen_zero[index] = true;
                    }
                }
            }

            for region in burst_type.random_regions() {
                for index in region.clone() {
                    assert!(
                        seen_one[index] && seen_zero[index],
                        "{burst_type} random bit {index} never varied"
                    );
                }
            }
        }
    }

    #[test]
    fn frequency_correction_burst_is_all_zeros() {
        let mut rng = StdRng::seed_from_u64(1);
        let bits = BurstGenerator::default().generate(BurstType::FrequencyCorrection, &mut rng);
        assert!(bits.iter().all(|&bit| bit == 0));
    }

    #[test]
    fn normal_burst_carries_selected_training_sequence() {
        let mut rng = StdRng::seed_from_u64(2);
        for tsc in 0..NB_TSC_COUNT as u8 {
            let generator = BurstGenerator::with_tsc(tsc).expect("valid tsc");
            let bits = generator.generate(BurstType::Normal, &mut rng);
            assert_eq!(&bits[61..87], &NB_TSC_LIST[usize::from(tsc)]);
            assert_eq!(&bits[..3], &[0, 0, 0]);
            assert_eq!(&bits[145..], &[0, 0, 0]);
        }
        assert!(BurstGenerator::with_tsc(8).is_none());
    }

    #[test]
    fn access_burst_layout() {
        let mut rng = StdRng::seed_from_u64(3);
        let bits = BurstGenerator::default().generate(BurstType::Access, &mut rng);
        assert_eq!(&bits[..8], &AB_EXTENDED_TAIL);
        assert_eq!(&bits[8..49], &AB_SYNC_SEQ);
        assert!(bits[85..].iter().all(|&bit| bit == 0));
    }

    #[test]
    fn synchronization_burst_layout() {
        let mut rng = StdRng::seed_from_u64(4);
        let bits = BurstGenerator::default().generate(BurstType::Synchronization, &mut rng);
        assert_eq!(&bits[42..106], &SB_TRAINING_SEQ);
        assert_eq!(&bits[..3], &[0, 0, 0]);
        assert_eq!(&bits[145..], &[0, 0, 0]);
    }

    #[test]
    fn consecutive_normal_bursts_differ() {
        let generator = BurstGenerator::default();
        let mut rng = StdRng::from_entropy();
        let first = generator.generate(BurstType::Normal, &mut rng);
        let second = generator.generate(BurstType::Normal, &mut rng);
        assert_ne!(first, second);
    }

    #[test]
    fn parses_burst_type_labels() {
        for burst_type in BurstType::ALL {
            assert_eq!(burst_type.as_label().parse::<BurstType>(), Ok(burst_type));
        }
        assert!("XB".parse::<BurstType>().is_err());
        assert!("nb".parse::<BurstType>().is_err());
    }
}
