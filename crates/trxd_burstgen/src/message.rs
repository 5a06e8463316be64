use std::fmt;
use std::ops::RangeInclusive;

use thiserror::Error;

use crate::burst::GSM_BURST_LEN;

/// 26 * 51 * 2048 TDMA frames; frame numbers wrap to zero after this.
pub const GSM_HYPERFRAME: u32 = 26 * 51 * 2048;
pub const TRX_TIMESLOTS: u8 = 8;

pub const SOFT_BIT_MAGNITUDE: i8 = 127;

pub const PWR_RANDOM_RANGE: RangeInclusive<u8> = 0..=u8::MAX;
pub const RSSI_RANDOM_RANGE: RangeInclusive<i16> = -120..=-50;
/// RSSI travels as a single byte holding `-rssi`.
pub const RSSI_VALID_RANGE: RangeInclusive<i16> = -255..=0;
pub const TOA256_RANDOM_RANGE: RangeInclusive<i16> = -256..=256;

// TN(1) FN(4) PWR(1)
pub const L1_TO_TRX_HEADER_LEN: usize = 6;
// TN(1) FN(4) RSSI(1) TOA256(2)
pub const TRX_TO_L1_HEADER_LEN: usize = 8;
// Legacy TRX->L1 bursts are followed by two unused bytes.
pub const TRX_TO_L1_PADDING_LEN: usize = 2;

pub const L1_TO_TRX_MSG_LEN: usize = L1_TO_TRX_HEADER_LEN + GSM_BURST_LEN;
pub const TRX_TO_L1_MSG_LEN: usize = TRX_TO_L1_HEADER_LEN + GSM_BURST_LEN + TRX_TO_L1_PADDING_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkDirection {
    /// Downlink: transmit requests from L1 towards the transceiver.
    L1ToTrx,
    /// Uplink: received bursts from the transceiver towards L1.
    TrxToL1,
}

impl LinkDirection {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::L1ToTrx => "L1->TRX",
            Self::TrxToL1 => "TRX->L1",
        }
    }

    pub fn message_len(self) -> usize {
        match self {
            Self::L1ToTrx => L1_TO_TRX_MSG_LEN,
            Self::TrxToL1 => TRX_TO_L1_MSG_LEN,
        }
    }
}

/// `(fn_init + index) mod GSM_HYPERFRAME` without intermediate overflow.
pub fn frame_number_at(fn_init: u32, index: u32) -> u32 {
    ((u64::from(fn_init) + u64::from(index)) % u64::from(GSM_HYPERFRAME)) as u32
}

pub fn ubit_to_sbit(bits: &[u8]) -> Vec<i8> {
    bits.iter()
        .map(|&bit| {
            if bit != 0 {
                -SOFT_BIT_MAGNITUDE
            } else {
                SOFT_BIT_MAGNITUDE
            }
        })
        .collect()
}

/// Hard decision on soft bits: negative means `1`.
pub fn sbit_to_ubit(bits: &[i8]) -> Vec<u8> {
    bits.iter().map(|&bit| u8::from(bit < 0)).collect()
}

fn sbit_to_usbit(bit: i8) -> u8 {
    (i16::from(SOFT_BIT_MAGNITUDE) - i16::from(bit)).clamp(0, 254) as u8
}

fn usbit_to_sbit(bit: u8) -> i8 {
    (i16::from(SOFT_BIT_MAGNITUDE) - i16::from(bit)).max(-i16::from(SOFT_BIT_MAGNITUDE)) as i8
}

/// Header fields shared by both message directions, plus the
/// direction-specific wire encoding.
pub trait DataHeader {
    fn direction(&self) -> LinkDirection;
    fn frame_number(&self) -> u32;
    fn timeslot(&self) -> u8;
    /// One-line summary of the header fields that go on the wire,
    /// e.g. `fn=42 tn=3 pwr=10`.
    fn describe(&self) -> String;
    fn encode_into(&self, out: &mut Vec<u8>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownlinkMessage {
    pub frame_number: u32,
    pub timeslot: u8,
    pub pwr: u8,
    /// Model only: the downlink wire header has no ToA slot, so this is
    /// neither encoded nor shown by `describe`.
    pub toa256: i16,
    /// Hard bits, one `0`/`1` per element.
    pub burst: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UplinkMessage {
    pub frame_number: u32,
    pub timeslot: u8,
    pub rssi: i16,
    pub toa256: i16,
    /// Soft bits in `-127..=127`, negative meaning `1`.
    pub burst: Vec<i8>,
}

impl DataHeader for DownlinkMessage {
    fn direction(&self) -> LinkDirection {
        LinkDirection::L1ToTrx
    }

    fn frame_number(&self) -> u32 {
        self.frame_number
    }

    fn timeslot(&self) -> u8 {
        self.timeslot
    }

    fn describe(&self) -> String {
        format!("fn={} tn={} pwr={}", self.frame_number, self.timeslot, self.pwr)
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.timeslot);
        out.extend_from_slice(&self.frame_number.to_be_bytes());
        out.push(self.pwr);
        out.extend_from_slice(&self.burst);
    }
}

impl DataHeader for UplinkMessage {
    fn direction(&self) -> LinkDirection {
        LinkDirection::TrxToL1
    }

    fn frame_number(&self) -> u32 {
        self.frame_number
    }

    fn timeslot(&self) -> u8 {
        self.timeslot
    }

    fn describe(&self) -> String {
        format!(
            "fn={} tn={} rssi={} toa256={}",
            self.frame_number, self.timeslot, self.rssi, self.toa256
        )
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.timeslot);
        out.extend_from_slice(&self.frame_number.to_be_bytes());
        out.push(self.rssi.unsigned_abs().min(255) as u8);
        out.extend_from_slice(&self.toa256.to_be_bytes());
        out.extend(self.burst.iter().map(|&bit| sbit_to_usbit(bit)));
        out.extend_from_slice(&[0u8; TRX_TO_L1_PADDING_LEN]);
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MessageDecodeError {
    #[error("message length {actual} does not match expected {expected}")]
    Length { expected: usize, actual: usize },
    #[error("timeslot {0} out of range")]
    Timeslot(u8),
    #[error("frame number {0} exceeds hyperframe")]
    FrameNumber(u32),
    #[error("hard bit at {index} has value {value}")]
    HardBit { index: usize, value: u8 },
}

/// One TRXD message, shaped by the endpoint that originates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataMessage {
    Downlink(DownlinkMessage),
    Uplink(UplinkMessage),
}

impl DataMessage {
    pub fn header(&self) -> &dyn DataHeader {
        match self {
            Self::Downlink(msg) => msg,
            Self::Uplink(msg) => msg,
        }
    }

    pub fn direction(&self) -> LinkDirection {
        self.header().direction()
    }

    /// Hard bits carried by the message, recovered from soft bits on uplink.
    pub fn hard_bits(&self) -> Vec<u8> {
        match self {
            Self::Downlink(msg) => msg.burst.clone(),
            Self::Uplink(msg) => sbit_to_ubit(&msg.burst),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.direction().message_len());
        self.header().encode_into(&mut out);
        out
    }

    /// Parses the bytes produced by [`DataMessage::encode`]. The downlink
    /// ToA is not on the wire and decodes as zero.
    pub fn decode(direction: LinkDirection, data: &[u8]) -> Result<Self, MessageDecodeError> {
        let expected = direction.message_len();
        if data.len() != expected {
            return Err(MessageDecodeError::Length {
                expected,
                actual: data.len(),
            });
        }

        let timeslot = data[0];
        if timeslot >= TRX_TIMESLOTS {
            return Err(MessageDecodeError::Timeslot(timeslot));
        }
        let frame_number = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);
        if frame_number >= GSM_HYPERFRAME {
            return Err(MessageDecodeError::FrameNumber(frame_number));
        }

        match direction {
            LinkDirection::L1ToTrx => {
                let burst = data[L1_TO_TRX_HEADER_LEN..].to_vec();
                if let Some((index, &value)) = burst.iter().enumerate().find(|&(_, &bit)| bit > 1) {
                    return Err(MessageDecodeError::HardBit { index, value });
                }
                Ok(Self::Downlink(DownlinkMessage {
                    frame_number,
                    timeslot,
                    pwr: data[5],
                    toa256: 0,
                    burst,
                }))
            }
            LinkDirection::TrxToL1 => {
                let burst_end = TRX_TO_L1_HEADER_LEN + GSM_BURST_LEN;
                Ok(Self::Uplink(UplinkMessage {
                    frame_number,
                    timeslot,
                    rssi: -i16::from(data[5]),
                    toa256: i16::from_be_bytes([data[6], data[7]]),
                    burst: data[TRX_TO_L1_HEADER_LEN..burst_end]
                        .iter()
                        .map(|&bit| usbit_to_sbit(bit))
                        .collect(),
                }))
            }
        }
    }
}

impl fmt::Display for DataMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header().describe())
    }
}
