use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;

use portable_atomic::Ordering;
use tracing::debug;

use crate::builder::DogStatsdBuilder;
use crate::client::Client;
use crate::common::Error;
use crate::event::Event;
use crate::formatting::{render_tags, write_event_line, write_metric_line, MetricType};
use crate::telemetry::Telemetry;
use crate::transport::Transport;
use crate::util::{combine, sampled, Tags};

pub(crate) struct Inner {
    pub namespace: Option<String>,
    pub transport: Arc<dyn Transport>,
    pub telemetry: Option<Arc<Telemetry>>,
}

impl Inner {
    fn send(&self, datagram: String) {
        if let Err(e) = self.transport.send(datagram) {
            debug!("dropped dogstatsd datagram: {}", e);
            if let Some(telemetry) = &self.telemetry {
                telemetry.packets_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(telemetry) = &self.telemetry {
            if telemetry.due() {
                self.send_telemetry(telemetry);
            }
        }
    }

    fn send_telemetry(&self, telemetry: &Telemetry) {
        for line in telemetry.render() {
            if let Err(e) = self.transport.send(line) {
                debug!("dropped dogstatsd telemetry: {}", e);
            }
        }
    }
}

/// A dogstatsd client: every call is rendered as a datagram and handed to the transport.
///
/// Sampling happens here: with a rate below `1.0`, each call is only sent with that
/// probability and carries the rate so the daemon can scale counts back up.
///
/// ```no_run
/// use tagged_metrics::{Client, DogStatsdClient};
///
/// let client = DogStatsdClient::new("127.0.0.1:8125", "myprefix");
/// client.with_tags(&[("tag", "value")]).incr("requests.count");
/// ```
#[derive(Clone)]
pub struct DogStatsdClient {
    inner: Arc<Inner>,
    rate: f64,
    tags: Tags,
}

impl DogStatsdClient {
    /// Creates a client sending to `address` over UDP, with metric names prefixed by
    /// `namespace` followed by a period.
    ///
    /// ## Panics
    ///
    /// Panics if the address can't be resolved or the exporter can't be started; use
    /// [`DogStatsdBuilder`] to handle those errors.
    pub fn new(address: &str, namespace: &str) -> Self {
        let built = DogStatsdBuilder::new()
            .with_address(address)
            .and_then(|builder| builder.set_namespace(namespace).build());
        match built {
            Ok(client) => client,
            Err(e) => panic!("failed to build dogstatsd client: {}", e),
        }
    }

    pub fn builder() -> DogStatsdBuilder {
        DogStatsdBuilder::new()
    }

    /// Clones this client with additional tags. Duplicate tags overwrite the existing value.
    pub fn with_tags(&self, tags: &[(&str, &str)]) -> Self {
        Self {
            inner: self.inner.clone(),
            rate: self.rate,
            tags: combine(&self.tags, tags),
        }
    }

    /// Clones this client with a new sample rate.
    pub fn with_rate(&self, rate: f64) -> Self {
        Self {
            inner: self.inner.clone(),
            rate,
            tags: self.tags.clone(),
        }
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    fn emit<T: Display>(&self, name: &str, value: T, mtype: MetricType) {
        if !sampled(self.rate) {
            return;
        }

        let mut line = String::new();
        write_metric_line(
            &mut line,
            self.inner.namespace.as_deref(),
            name,
            value,
            mtype,
            self.rate,
            &render_tags(&self.tags),
        );
        if let Some(telemetry) = &self.inner.telemetry {
            telemetry.metrics.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.send(line);
    }

    pub fn count(&self, name: &str, value: i64) {
        self.emit(name, value, MetricType::Count);
    }

    pub fn incr(&self, name: &str) {
        self.count(name, 1);
    }

    pub fn decr(&self, name: &str) {
        self.count(name, -1);
    }

    pub fn gauge(&self, name: &str, value: f64) {
        self.emit(name, value, MetricType::Gauge);
    }

    /// Sends an event, with this client's tags added after the event's own tags.
    pub fn event(&self, event: Event) {
        let mut line = String::new();
        write_event_line(&mut line, &event, &render_tags(&self.tags));
        if let Some(telemetry) = &self.inner.telemetry {
            telemetry.events.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.send(line);
    }

    /// Sends a duration in milliseconds.
    pub fn timing(&self, name: &str, value: Duration) {
        self.emit(name, value.as_secs_f64() * 1000.0, MetricType::Timing);
    }

    pub fn histogram(&self, name: &str, value: f64) {
        self.emit(name, value, MetricType::Histogram);
    }

    pub fn distribution(&self, name: &str, value: f64) {
        self.emit(name, value, MetricType::Distribution);
    }

    /// Sends pending telemetry, then flushes and closes the transport.
    pub fn close(&self) -> Result<(), Error> {
        if let Some(telemetry) = &self.inner.telemetry {
            self.inner.send_telemetry(telemetry);
        }
        self.inner.transport.flush()?;
        self.inner.transport.close()
    }
}

impl From<Inner> for DogStatsdClient {
    fn from(inner: Inner) -> Self {
        DogStatsdClient {
            inner: Arc::new(inner),
            rate: 1.0,
            tags: Tags::new(),
        }
    }
}

impl fmt::Debug for DogStatsdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DogStatsdClient")
            .field("namespace", &self.inner.namespace)
            .field("transport", &self.inner.transport.kind())
            .field("telemetry", &self.inner.telemetry.is_some())
            .field("rate", &self.rate)
            .field("tags", &self.tags)
            .finish()
    }
}

impl Client for DogStatsdClient {
    fn with_tags(&self, tags: &[(&str, &str)]) -> Box<dyn Client> {
        Box::new(DogStatsdClient::with_tags(self, tags))
    }

    fn with_rate(&self, rate: f64) -> Box<dyn Client> {
        Box::new(DogStatsdClient::with_rate(self, rate))
    }

    fn count(&self, name: &str, value: i64) {
        DogStatsdClient::count(self, name, value)
    }

    fn gauge(&self, name: &str, value: f64) {
        DogStatsdClient::gauge(self, name, value)
    }

    fn event(&self, event: Event) {
        DogStatsdClient::event(self, event)
    }

    fn timing(&self, name: &str, value: Duration) {
        DogStatsdClient::timing(self, name, value)
    }

    fn histogram(&self, name: &str, value: f64) {
        DogStatsdClient::histogram(self, name, value)
    }

    fn distribution(&self, name: &str, value: f64) {
        DogStatsdClient::distribution(self, name, value)
    }

    fn close(&self) -> Result<(), Error> {
        DogStatsdClient::close(self)
    }
}
