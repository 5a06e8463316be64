use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use thiserror::Error;
use tiny_http::{Method, Response, Server, StatusCode};

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus registration failed: {0}")]
    Registration(#[from] prometheus::Error),
    #[error("unable to bind metrics endpoint: {0}")]
    Bind(String),
}

#[derive(Clone)]
pub struct GeneratorMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    messages_sent_total: IntCounterVec,
    bytes_sent_total: IntCounter,
    send_errors_total: IntCounter,
    capture_records_total: IntCounter,
    capture_errors_total: IntCounter,
}

impl GeneratorMetrics {
    pub fn new(namespace: &str) -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let messages_sent_total = IntCounterVec::new(
            Opts::new("messages_sent_total", "Total TRXD messages sent").namespace(namespace),
            &["burst_type"],
        )?;
        let bytes_sent_total = IntCounter::with_opts(
            Opts::new("bytes_sent_total", "Total TRXD payload bytes sent").namespace(namespace),
        )?;
        let send_errors_total = IntCounter::with_opts(
            Opts::new("send_errors_total", "Total failed datagram sends").namespace(namespace),
        )?;
        let capture_records_total = IntCounter::with_opts(
            Opts::new(
                "capture_records_total",
                "Total records appended to the capture file",
            )
            .namespace(namespace),
        )?;
        let capture_errors_total = IntCounter::with_opts(
            Opts::new(
                "capture_errors_total",
                "Total failed capture file writes",
            )
            .namespace(namespace),
        )?;

        registry.register(Box::new(messages_sent_total.clone()))?;
        registry.register(Box::new(bytes_sent_total.clone()))?;
        registry.register(Box::new(send_errors_total.clone()))?;
        registry.register(Box::new(capture_records_total.clone()))?;
        registry.register(Box::new(capture_errors_total.clone()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                messages_sent_total,
                bytes_sent_total,
                send_errors_total,
                capture_records_total,
                capture_errors_total,
            }),
        })
    }

    pub fn record_message_sent(&self, burst_type: &'static str, bytes: usize) {
        self.inner
            .messages_sent_total
            .with_label_values(&[burst_type])
            .inc();
        self.inner.bytes_sent_total.inc_by(bytes as u64);
    }

    pub fn record_send_error(&self) {
        self.inner.send_errors_total.inc();
    }

    pub fn record_capture_record(&self) {
        self.inner.capture_records_total.inc();
    }

    pub fn record_capture_error(&self) {
        self.inner.capture_errors_total.inc();
    }

    pub fn messages_sent(&self, burst_type: &str) -> u64 {
        self.inner
            .messages_sent_total
            .with_label_values(&[burst_type])
            .get()
    }

    pub fn snapshot(&self) -> Result<String, MetricsError> {
        let metric_families = self.inner.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn spawn_exporter(
        &self,
        listen_addr: SocketAddr,
    ) -> Result<thread::JoinHandle<()>, MetricsError> {
        let server =
            Server::http(listen_addr).map_err(|err| MetricsError::Bind(err.to_string()))?;
        let registry = self.inner.registry.clone();

        Ok(thread::spawn(move || {
            let encoder = TextEncoder::new();
            for request in server.incoming_requests() {
                if request.method() != &Method::Get || request.url() != "/metrics" {
                    let _ = request.respond(Response::empty(StatusCode(404)));
                    continue;
                }

                let mut buffer = Vec::new();
                if encoder.encode(&registry.gather(), &mut buffer).is_err() {
                    let response = Response::from_string("failed to encode metrics")
                        .with_status_code(StatusCode(500));
                    let _ = request.respond(response);
                    continue;
                }

                let _ = request.respond(Response::from_data(buffer).with_status_code(StatusCode(200)));
            }
        }))
    }
}
