use std::time::Duration;

use parking_lot::Mutex;
use portable_atomic::{AtomicU64, Ordering};
use quanta::{Clock, Instant};

use crate::formatting::{write_metric_line, MetricType};

const PREFIX: &str = "datadog.dogstatsd.client";

/// Counters describing the dogstatsd client itself, sent next to the regular metrics
/// at most once per interval.
pub(crate) struct Telemetry {
    clock: Clock,
    interval: Duration,
    last_flush: Mutex<Instant>,
    tags: Vec<String>,
    pub metrics: AtomicU64,
    pub events: AtomicU64,
    pub packets_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub packets_dropped: AtomicU64,
}

impl Telemetry {
    pub fn new(clock: Clock, interval: Duration, transport: &str) -> Self {
        let now = clock.now();
        Self {
            clock,
            interval,
            last_flush: Mutex::new(now),
            tags: vec![
                "client:rust".to_string(),
                format!("client_version:{}", env!("CARGO_PKG_VERSION")),
                format!("client_transport:{}", transport),
            ],
            metrics: AtomicU64::new(0),
            events: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            packets_dropped: AtomicU64::new(0),
        }
    }

    /// Returns true, at most once per interval, when telemetry should be sent.
    pub fn due(&self) -> bool {
        let now = self.clock.now();
        let mut last = self.last_flush.lock();
        if now.duration_since(*last) >= self.interval {
            *last = now;
            true
        } else {
            false
        }
    }

    /// Renders one datagram per counter, resetting the counters.
    pub fn render(&self) -> Vec<String> {
        [
            ("metrics", &self.metrics),
            ("events", &self.events),
            ("packets_sent", &self.packets_sent),
            ("bytes_sent", &self.bytes_sent),
            ("packets_dropped", &self.packets_dropped),
        ]
        .into_iter()
        .map(|(name, counter)| {
            let mut line = String::new();
            write_metric_line(
                &mut line,
                Some(PREFIX),
                name,
                counter.swap(0, Ordering::AcqRel),
                MetricType::Count,
                1.0,
                &self.tags,
            );
            line
        })
        .collect()
    }
}
