use std::io;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trxd_metrics::GeneratorMetrics;
use trxd_netio::DataInterface;

use crate::capture::CaptureWriter;
use crate::config::GenerationRun;
use crate::sequencer::MessageSequencer;

/// Destination of encoded messages.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&mut self, payload: &[u8]) -> io::Result<()>;
}

impl Transport for DataInterface {
    async fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        DataInterface::send(self, payload).await.map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub sent: u32,
    pub interrupted: bool,
    pub fn_init: u32,
}

/// Builds, sends and optionally captures `run.count` messages, one at a time.
///
/// Cancellation is observed before each message and during the pause between
/// messages; a message that has started is always sent and captured in full.
/// A run that fails validation is rejected before anything is sent. The first
/// transport or capture failure aborts the run.
pub async fn run_generator<T: Transport>(
    run: &GenerationRun,
    transport: &mut T,
    mut capture: Option<&mut CaptureWriter>,
    metrics: &GeneratorMetrics,
    shutdown: CancellationToken,
) -> Result<RunSummary> {
    let rng = match run.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut sequencer = MessageSequencer::new(run, rng).context("invalid generation run")?;
    let fn_init = sequencer.fn_init();
    let burst_label = run.burst_type.as_label();
    let destination = run.link.conn_mode.as_label();
    debug!(fn_init, count = run.count, "starting burst generation");

    let mut sent = 0u32;
    for index in 0..run.count {
        if shutdown.is_cancelled() {
            warn!(sent, total = run.count, "generation interrupted");
            return Ok(RunSummary {
                sent,
                interrupted: true,
                fn_init,
            });
        }

        let msg = sequencer.build(index);
        info!(
            "Sending {}/{} {} burst {} to {}...",
            index + 1,
            run.count,
            burst_label,
            msg,
            destination
        );

        let payload = msg.encode();
        if let Err(err) = transport.send(&payload).await {
            metrics.record_send_error();
            return Err(err).with_context(|| {
                format!(
                    "failed sending message {}/{} to {}",
                    index + 1,
                    run.count,
                    run.link.remote_socket_addr()
                )
            });
        }
        metrics.record_message_sent(burst_label, payload.len());
        sent += 1;

        if let Some(writer) = capture.as_deref_mut() {
            if let Err(err) = writer.append(&msg).await {
                metrics.record_capture_error();
                return Err(err).with_context(|| {
                    format!("failed writing capture file {}", writer.path().display())
                });
            }
            metrics.record_capture_record();
        }

        if !run.interval.is_zero() && index + 1 < run.count {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(run.interval) => {}
            }
        }
    }

    Ok(RunSummary {
        sent,
        interrupted: false,
        fn_init,
    })
}
