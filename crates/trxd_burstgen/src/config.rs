use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::burst::{BurstType, NB_TSC_COUNT};
use crate::message::{LinkDirection, GSM_HYPERFRAME, RSSI_VALID_RANGE, TRX_TIMESLOTS};

pub const DEFAULT_BASE_PORT: u16 = 5700;
pub const DEFAULT_REMOTE_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

// Port offsets from the base port for the TRX and L1 ends of the DATA link.
const TRX_DATA_PORT_OFFSET: u16 = 2;
const L1_DATA_PORT_OFFSET: u16 = 102;

/// Which end of the link receives our messages. In `Trx` mode the generator
/// impersonates L1; in `L1` mode it impersonates the transceiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum ConnMode {
    #[default]
    #[serde(rename = "TRX")]
    Trx,
    #[serde(rename = "L1")]
    L1,
}

impl ConnMode {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Trx => "TRX",
            Self::L1 => "L1",
        }
    }

    pub fn direction(self) -> LinkDirection {
        match self {
            Self::Trx => LinkDirection::L1ToTrx,
            Self::L1 => LinkDirection::TrxToL1,
        }
    }

    fn remote_port_offset(self) -> u16 {
        match self {
            Self::Trx => TRX_DATA_PORT_OFFSET,
            Self::L1 => L1_DATA_PORT_OFFSET,
        }
    }

    fn local_port_offset(self) -> u16 {
        match self {
            Self::Trx => L1_DATA_PORT_OFFSET,
            Self::L1 => TRX_DATA_PORT_OFFSET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    pub conn_mode: ConnMode,
    pub remote_addr: IpAddr,
    pub bind_addr: IpAddr,
    pub base_port: u16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            conn_mode: ConnMode::default(),
            remote_addr: DEFAULT_REMOTE_ADDR,
            bind_addr: DEFAULT_BIND_ADDR,
            base_port: DEFAULT_BASE_PORT,
        }
    }
}

impl LinkConfig {
    pub fn remote_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.remote_addr,
            self.base_port + self.conn_mode.remote_port_offset(),
        )
    }

    pub fn local_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.bind_addr,
            self.base_port + self.conn_mode.local_port_offset(),
        )
    }
}

/// Header fields pinned for every message of a run. Unset fields are
/// randomized per message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderOverrides {
    pub frame_number: Option<u32>,
    pub timeslot: Option<u8>,
    pub pwr: Option<u8>,
    pub rssi: Option<i16>,
    pub toa256: Option<i16>,
}

/// Validated, immutable parameters of one generator execution.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRun {
    pub link: LinkConfig,
    pub burst_type: BurstType,
    pub count: u32,
    pub overrides: HeaderOverrides,
    pub tsc: u8,
    pub seed: Option<u64>,
    pub interval: Duration,
    pub output_file: Option<PathBuf>,
}

impl GenerationRun {
    pub fn new(burst_type: BurstType) -> Self {
        Self {
            link: LinkConfig::default(),
            burst_type,
            count: 1,
            overrides: HeaderOverrides::default(),
            tsc: 0,
            seed: None,
            interval: Duration::ZERO,
            output_file: None,
        }
    }

    pub fn direction(&self) -> LinkDirection {
        self.link.conn_mode.direction()
    }

    pub fn from_params(params: RunParams) -> Result<Self> {
        let link = &params.link;
        let burst = &params.burst;

        let Some(burst_type) = burst.burst_type else {
            bail!("burst type is required (NB, FB, SB or AB)");
        };

        let toa256 = match (burst.toa, burst.toa256) {
            (Some(_), Some(_)) => bail!("toa and toa256 are mutually exclusive"),
            (Some(symbols), None) => Some(
                toa_symbols_to_toa256(symbols)
                    .with_context(|| format!("toa {symbols} is out of range"))?,
            ),
            (None, toa256) => toa256,
        };

        let run = Self {
            link: LinkConfig {
                conn_mode: link.conn_mode.unwrap_or_default(),
                remote_addr: link.remote_addr.unwrap_or(DEFAULT_REMOTE_ADDR),
                bind_addr: link.bind_addr.unwrap_or(DEFAULT_BIND_ADDR),
                base_port: link.base_port.unwrap_or(DEFAULT_BASE_PORT),
            },
            burst_type,
            count: burst.count.unwrap_or(1),
            overrides: HeaderOverrides {
                frame_number: burst.frame_number,
                timeslot: burst.timeslot,
                pwr: burst.pwr,
                rssi: burst.rssi,
                toa256,
            },
            tsc: burst.tsc.unwrap_or(0),
            seed: burst.seed,
            interval: Duration::from_millis(burst.interval_ms.unwrap_or(0)),
            output_file: burst.output_file.clone(),
        };
        run.validate()?;
        Ok(run)
    }

    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            bail!("burst count must be > 0");
        }
        if self
            .link
            .base_port
            .checked_add(L1_DATA_PORT_OFFSET)
            .is_none()
        {
            bail!(
                "base port must be <= {}",
                u16::MAX - L1_DATA_PORT_OFFSET
            );
        }
        if let Some(fn_) = self.overrides.frame_number {
            if fn_ >= GSM_HYPERFRAME {
                bail!("frame number must be < {GSM_HYPERFRAME}");
            }
        }
        if let Some(tn) = self.overrides.timeslot {
            if tn >= TRX_TIMESLOTS {
                bail!("timeslot must be < {TRX_TIMESLOTS}");
            }
        }
        if let Some(rssi) = self.overrides.rssi {
            if !RSSI_VALID_RANGE.contains(&rssi) {
                bail!(
                    "rssi must be within {}..={}",
                    RSSI_VALID_RANGE.start(),
                    RSSI_VALID_RANGE.end()
                );
            }
        }
        if usize::from(self.tsc) >= NB_TSC_COUNT {
            bail!("tsc must be < {NB_TSC_COUNT}");
        }
        Ok(())
    }
}

/// Converts a ToA in symbol periods to 1/256 symbol units, rounding half up
/// and truncating towards zero like the legacy tooling.
pub fn toa_symbols_to_toa256(symbols: f64) -> Option<i16> {
    let scaled = (symbols * 256.0 + 0.5).trunc();
    if scaled.is_finite() && scaled >= f64::from(i16::MIN) && scaled <= f64::from(i16::MAX) {
        Some(scaled as i16)
    } else {
        None
    }
}

/// Unvalidated run parameters as read from a TOML profile or the command
/// line. Every field is optional so the two sources can be layered.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunParams {
    #[serde(default)]
    pub link: LinkParams,
    #[serde(default)]
    pub burst: BurstParams,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkParams {
    pub conn_mode: Option<ConnMode>,
    pub remote_addr: Option<IpAddr>,
    pub bind_addr: Option<IpAddr>,
    pub base_port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BurstParams {
    pub burst_type: Option<BurstType>,
    pub count: Option<u32>,
    pub frame_number: Option<u32>,
    pub timeslot: Option<u8>,
    pub pwr: Option<u8>,
    pub rssi: Option<i16>,
    pub toa: Option<f64>,
    pub toa256: Option<i16>,
    pub tsc: Option<u8>,
    pub seed: Option<u64>,
    pub interval_ms: Option<u64>,
    pub output_file: Option<PathBuf>,
}

impl RunParams {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Fields set in `self` win; unset fields fall back to `base`. The two
    /// ToA spellings are one setting: if `self` sets either, `base` gives none.
    pub fn overlay(self, base: RunParams) -> RunParams {
        let (link, burst) = (self.link, self.burst);
        let (base_link, base_burst) = (base.link, base.burst);

        let (toa, toa256) = if burst.toa.is_some() || burst.toa256.is_some() {
            (burst.toa, burst.toa256)
        } else {
            (base_burst.toa, base_burst.toa256)
        };

        RunParams {
            link: LinkParams {
                conn_mode: link.conn_mode.or(base_link.conn_mode),
                remote_addr: link.remote_addr.or(base_link.remote_addr),
                bind_addr: link.bind_addr.or(base_link.bind_addr),
                base_port: link.base_port.or(base_link.base_port),
            },
            burst: BurstParams {
                burst_type: burst.burst_type.or(base_burst.burst_type),
                count: burst.count.or(base_burst.count),
                frame_number: burst.frame_number.or(base_burst.frame_number),
                timeslot: burst.timeslot.or(base_burst.timeslot),
                pwr: burst.pwr.or(base_burst.pwr),
                rssi: burst.rssi.or(base_burst.rssi),
                toa,
                toa256,
                tsc: burst.tsc.or(base_burst.tsc),
                seed: burst.seed.or(base_burst.seed),
                interval_ms: burst.interval_ms.or(base_burst.interval_ms),
                output_file: burst.output_file.or(base_burst.output_file),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_profile() -> &'static str {
        r#"
[link]
conn_mode = "L1"
remote_addr = "10.0.0.2"
bind_addr = "127.0.0.1"
base_port = 6700

[burst]
burst_type = "SB"
count = 16
timeslot = 3
rssi = -70
toa256 = 64
tsc = 5
seed = 99
interval_ms = 5
output_file = "bursts.capture"
"#
    }

    fn params_with(burst_type: BurstType) -> RunParams {
        RunParams {
            burst: BurstParams {
                burst_type: Some(burst_type),
                ..BurstParams::default()
            },
            ..RunParams::default()
        }
    }

    #[test]
    fn parse_valid_profile() {
        let params = RunParams::from_toml(good_profile()).expect("profile should parse");
        let run = GenerationRun::from_params(params).expect("profile should validate");
        assert_eq!(run.link.conn_mode, ConnMode::L1);
        assert_eq!(run.burst_type, BurstType::Synchronization);
        assert_eq!(run.count, 16);
        assert_eq!(run.overrides.timeslot, Some(3));
        assert_eq!(run.overrides.rssi, Some(-70));
        assert_eq!(run.overrides.toa256, Some(64));
        assert_eq!(run.overrides.frame_number, None);
        assert_eq!(run.tsc, 5);
        assert_eq!(run.seed, Some(99));
        assert_eq!(run.interval, Duration::from_millis(5));
        assert_eq!(run.output_file, Some(PathBuf::from("bursts.capture")));
    }

    #[test]
    fn defaults_apply_to_minimal_params() {
        let run = GenerationRun::from_params(params_with(BurstType::Normal)).expect("valid");
        assert_eq!(run, GenerationRun::new(BurstType::Normal));
        assert_eq!(run.link.conn_mode, ConnMode::Trx);
        assert_eq!(run.link.base_port, 5700);
        assert_eq!(run.count, 1);
    }

    #[test]
    fn trx_mode_ports() {
        let link = LinkConfig::default();
        assert_eq!(link.remote_socket_addr().to_string(), "127.0.0.1:5702");
        assert_eq!(link.local_socket_addr().to_string(), "0.0.0.0:5802");
    }

    #[test]
    fn l1_mode_swaps_ports() {
        let link = LinkConfig {
            conn_mode: ConnMode::L1,
            ..LinkConfig::default()
        };
        assert_eq!(link.remote_socket_addr().port(), 5802);
        assert_eq!(link.local_socket_addr().port(), 5702);
        assert_eq!(link.conn_mode.direction(), LinkDirection::TrxToL1);
    }

    #[test]
    fn missing_burst_type_is_rejected() {
        let err = GenerationRun::from_params(RunParams::default()).expect_err("should fail");
        assert!(err.to_string().contains("burst type"), "unexpected error: {err}");
    }

    #[test]
    fn unknown_burst_type_or_mode_fails_to_parse() {
        let bad_burst = good_profile().replace("\"SB\"", "\"XB\"");
        assert!(RunParams::from_toml(&bad_burst).is_err());

        let bad_mode = good_profile().replace("\"L1\"", "\"BTS\"");
        assert!(RunParams::from_toml(&bad_mode).is_err());
    }

    #[test]
    fn reject_out_of_range_fields() {
        let cases = [
            ("count = 16", "count = 0", "burst count"),
            ("timeslot = 3", "timeslot = 8", "timeslot"),
            ("rssi = -70", "rssi = 10", "rssi"),
            ("tsc = 5", "tsc = 8", "tsc"),
            ("base_port = 6700", "base_port = 65500", "base port"),
            ("count = 16", "count = 16\nframe_number = 2715648", "frame number"),
        ];
        for (from, to, needle) in cases {
            let raw = good_profile().replace(from, to);
            let params = RunParams::from_toml(&raw).expect("profile should parse");
            let err = GenerationRun::from_params(params).expect_err("should fail validation");
            assert!(err.to_string().contains(needle), "unexpected error: {err}");
        }
    }

    #[test]
    fn toa_symbols_conversion() {
        assert_eq!(toa_symbols_to_toa256(1.0), Some(256));
        assert_eq!(toa_symbols_to_toa256(0.5), Some(128));
        assert_eq!(toa_symbols_to_toa256(0.0), Some(0));
        assert_eq!(toa_symbols_to_toa256(-1.0), Some(-255));
        assert_eq!(toa_symbols_to_toa256(1000.0), None);
        assert_eq!(toa_symbols_to_toa256(f64::NAN), None);
    }

    #[test]
    fn toa_and_toa256_are_exclusive() {
        let mut params = params_with(BurstType::Access);
        params.burst.toa = Some(1.0);
        params.burst.toa256 = Some(5);
        let err = GenerationRun::from_params(params).expect_err("should fail");
        assert!(err.to_string().contains("mutually exclusive"), "unexpected error: {err}");
    }

    #[test]
    fn toa_in_symbols_becomes_toa256() {
        let mut params = params_with(BurstType::Access);
        params.burst.toa = Some(1.0);
        let run = GenerationRun::from_params(params).expect("valid");
        assert_eq!(run.overrides.toa256, Some(256));
    }

    #[test]
    fn overlay_prefers_explicit_values() {
        let file = RunParams::from_toml(good_profile()).expect("profile should parse");
        let mut cli = params_with(BurstType::Normal);
        cli.burst.count = Some(3);
        cli.burst.toa = Some(0.5);

        let merged = cli.overlay(file);
        assert_eq!(merged.burst.burst_type, Some(BurstType::Normal));
        assert_eq!(merged.burst.count, Some(3));
        assert_eq!(merged.burst.timeslot, Some(3));
        assert_eq!(merged.link.conn_mode, Some(ConnMode::L1));
        assert_eq!(merged.burst.toa, Some(0.5));
        assert_eq!(merged.burst.toa256, None);

        let run = GenerationRun::from_params(merged).expect("merged params validate");
        assert_eq!(run.overrides.toa256, Some(128));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let raw = format!("{}\nburst_size = 4\n", good_profile());
        assert!(RunParams::from_toml(&raw).is_err());
    }
}
