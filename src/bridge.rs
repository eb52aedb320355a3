use std::collections::HashMap;
use std::sync::Arc;

use metrics::{
    Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Metadata,
    Recorder, SharedString, Unit,
};
use parking_lot::Mutex;
use portable_atomic::{AtomicF64, Ordering};

use crate::client::Client;
use crate::common::BuildError;

/// Exposes a [`Client`] as a [`metrics`] recorder, so the `counter!`/`gauge!`/`histogram!`
/// macros land in it.
///
/// Counter increments are sent as counts and absolute counters as gauges. Gauges keep the
/// last value per key so that increments and decrements can be sent as the resulting value.
/// Key labels become tags.
pub struct MetricsBridge<C> {
    client: C,
    gauges: Mutex<HashMap<Key, Arc<AtomicF64>>>,
}

impl<C: Client> MetricsBridge<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            gauges: Mutex::new(HashMap::new()),
        }
    }

    fn tagged(&self, key: &Key) -> Box<dyn Client> {
        let labels: Vec<(&str, &str)> = key.labels().map(|l| (l.key(), l.value())).collect();
        self.client.with_tags(&labels)
    }
}

struct BridgeCounter {
    client: Box<dyn Client>,
    name: String,
}

impl CounterFn for BridgeCounter {
    fn increment(&self, value: u64) {
        self.client
            .count(&self.name, i64::try_from(value).unwrap_or(i64::MAX));
    }

    fn absolute(&self, value: u64) {
        self.client.gauge(&self.name, value as f64);
    }
}

struct BridgeGauge {
    client: Box<dyn Client>,
    name: String,
    value: Arc<AtomicF64>,
}

impl GaugeFn for BridgeGauge {
    fn increment(&self, value: f64) {
        let previous = self.value.fetch_add(value, Ordering::AcqRel);
        self.client.gauge(&self.name, previous + value);
    }

    fn decrement(&self, value: f64) {
        let previous = self.value.fetch_sub(value, Ordering::AcqRel);
        self.client.gauge(&self.name, previous - value);
    }

    fn set(&self, value: f64) {
        self.value.store(value, Ordering::Release);
        self.client.gauge(&self.name, value);
    }
}

struct BridgeHistogram {
    client: Box<dyn Client>,
    name: String,
}

impl HistogramFn for BridgeHistogram {
    fn record(&self, value: f64) {
        self.client.histogram(&self.name, value);
    }
}

impl<C: Client> Recorder for MetricsBridge<C> {
    fn describe_counter(&self, _k: KeyName, _u: Option<Unit>, _d: SharedString) {}
    fn describe_gauge(&self, _k: KeyName, _u: Option<Unit>, _d: SharedString) {}
    fn describe_histogram(&self, _k: KeyName, _u: Option<Unit>, _d: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(BridgeCounter {
            client: self.tagged(key),
            name: key.name().to_string(),
        }))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        let value = self
            .gauges
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AtomicF64::new(0.0)))
            .clone();

        Gauge::from_arc(Arc::new(BridgeGauge {
            client: self.tagged(key),
            name: key.name().to_string(),
            value,
        }))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(BridgeHistogram {
            client: self.tagged(key),
            name: key.name().to_string(),
        }))
    }
}

/// Installs `client` as the global [`metrics`] recorder.
///
/// ## Errors
///
/// If a global recorder was already installed, an error variant will be returned.
pub fn install<C>(client: C) -> Result<(), BuildError>
where
    C: Client + 'static,
{
    metrics::set_global_recorder(MetricsBridge::new(client))
        .map_err(|_| BuildError::FailedToSetGlobalRecorder)
}
