use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use trxd_burstgen::config::{BurstParams, ConnMode, LinkParams};
use trxd_burstgen::{run_generator, BurstType, CaptureWriter, GenerationRun, RunParams};
use trxd_metrics::GeneratorMetrics;
use trxd_netio::DataInterface;

#[derive(Debug, Parser)]
#[command(name = "trxd_burst_gen")]
#[command(about = "Random burst generator for the TRX DATA interface", version)]
struct Args {
    /// TOML profile providing defaults for any of the options below
    #[arg(long)]
    config: Option<PathBuf>,

    /// Append every sent message to this capture file
    #[arg(short = 'o', long)]
    output_file: Option<PathBuf>,

    /// Which end of the link to send to (default TRX)
    #[arg(short = 'm', long, value_enum)]
    conn_mode: Option<ConnModeArg>,
    /// Remote IP address (default 127.0.0.1)
    #[arg(short = 'r', long)]
    remote_addr: Option<IpAddr>,
    /// Local IP address to bind (default 0.0.0.0)
    #[arg(short = 'b', long)]
    bind_addr: Option<IpAddr>,
    /// Base port of the TRX interface (default 5700)
    #[arg(short = 'p', long)]
    base_port: Option<u16>,

    #[arg(long, value_enum)]
    burst_type: Option<BurstTypeArg>,
    /// Number of bursts to send (default 1)
    #[arg(short = 'c', long)]
    burst_count: Option<u32>,
    /// Starting TDMA frame number (default random)
    #[arg(short = 'f', long)]
    frame_number: Option<u32>,
    /// Timeslot index (default random)
    #[arg(short = 't', long)]
    timeslot: Option<u8>,
    /// Transmit power level, downlink only (default random)
    #[arg(long)]
    pwr: Option<u8>,
    /// RSSI in dBm, uplink only (default random)
    #[arg(long, allow_negative_numbers = true)]
    rssi: Option<i16>,
    /// Timing of arrival in symbol periods
    #[arg(long, allow_negative_numbers = true, conflicts_with = "toa256")]
    toa: Option<f64>,
    /// Timing of arrival in 1/256 symbol periods
    #[arg(long, allow_negative_numbers = true)]
    toa256: Option<i16>,
    /// Normal burst training sequence code, 0..=7 (default 0)
    #[arg(long)]
    tsc: Option<u8>,
    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
    /// Pause between bursts in milliseconds (default 0)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Serve prometheus metrics on this address
    #[arg(long)]
    metrics_listen: Option<SocketAddr>,
    #[arg(long, value_enum, default_value_t = LogLevelArg::Info)]
    log_level: LogLevelArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConnModeArg {
    #[value(name = "TRX")]
    Trx,
    #[value(name = "L1")]
    L1,
}

impl From<ConnModeArg> for ConnMode {
    fn from(value: ConnModeArg) -> Self {
        match value {
            ConnModeArg::Trx => ConnMode::Trx,
            ConnModeArg::L1 => ConnMode::L1,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BurstTypeArg {
    #[value(name = "NB")]
    Nb,
    #[value(name = "FB")]
    Fb,
    #[value(name = "SB")]
    Sb,
    #[value(name = "AB")]
    Ab,
}

impl From<BurstTypeArg> for BurstType {
    fn from(value: BurstTypeArg) -> Self {
        match value {
            BurstTypeArg::Nb => BurstType::Normal,
            BurstTypeArg::Fb => BurstType::FrequencyCorrection,
            BurstTypeArg::Sb => BurstType::Synchronization,
            BurstTypeArg::Ab => BurstType::Access,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for Level {
    fn from(value: LogLevelArg) -> Self {
        match value {
            LogLevelArg::Error => Level::ERROR,
            LogLevelArg::Warn => Level::WARN,
            LogLevelArg::Info => Level::INFO,
            LogLevelArg::Debug => Level::DEBUG,
            LogLevelArg::Trace => Level::TRACE,
        }
    }
}

impl Args {
    fn run_params(&self) -> RunParams {
        RunParams {
            link: LinkParams {
                conn_mode: self.conn_mode.map(Into::into),
                remote_addr: self.remote_addr,
                bind_addr: self.bind_addr,
                base_port: self.base_port,
            },
            burst: BurstParams {
                burst_type: self.burst_type.map(Into::into),
                count: self.burst_count,
                frame_number: self.frame_number,
                timeslot: self.timeslot,
                pwr: self.pwr,
                rssi: self.rssi,
                toa: self.toa,
                toa256: self.toa256,
                tsc: self.tsc,
                seed: self.seed,
                interval_ms: self.interval_ms,
                output_file: self.output_file.clone(),
            },
        }
    }
}

fn usage_error(message: impl std::fmt::Display) -> ! {
    Args::command()
        .error(ErrorKind::ValueValidation, message)
        .exit()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(args.log_level))
        .with_target(false)
        .init();
    info!(
        "{} v{} starting",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let file_params = match &args.config {
        Some(path) => {
            RunParams::from_file(path).unwrap_or_else(|err| usage_error(format!("{err:#}")))
        }
        None => RunParams::default(),
    };
    let run = GenerationRun::from_params(args.run_params().overlay(file_params))
        .unwrap_or_else(|err| usage_error(format!("{err:#}")));

    let metrics = GeneratorMetrics::new("trxd_burst_gen")?;
    let _exporter_thread = match args.metrics_listen {
        Some(addr) => {
            let handle = metrics.spawn_exporter(addr)?;
            info!("metrics exporter listening on {addr}");
            Some(handle)
        }
        None => None,
    };

    let mut capture = match &run.output_file {
        Some(path) => Some(CaptureWriter::open(path).await?),
        None => None,
    };

    let local_addr = run.link.local_socket_addr();
    let remote_addr = run.link.remote_socket_addr();
    let mut iface = DataInterface::bind(local_addr, remote_addr)
        .with_context(|| format!("failed binding data interface on {local_addr}"))?;
    info!(
        "{} mode: sending {} bursts from {local_addr} to {remote_addr}",
        run.link.conn_mode.as_label(),
        run.burst_type
    );

    let shutdown = CancellationToken::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_shutdown.cancel();
        }
    });

    let summary = run_generator(&run, &mut iface, capture.as_mut(), &metrics, shutdown).await?;
    info!(
        sent = summary.sent,
        interrupted = summary.interrupted,
        fn_init = summary.fn_init,
        "burst generation finished"
    );
    Ok(())
}
