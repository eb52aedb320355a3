//! A tagged metrics client with interchangeable backends and an in-memory recorder for tests.
//!
//! ## Basics
//!
//! Application code is written against the [`Client`] trait: counts, gauges, timings,
//! histograms, distributions and events, each carrying a set of `key:value` tags and a
//! sample rate. Which backend receives the calls is decided once, at startup:
//!
//! - [`DogStatsdClient`] sends datagrams to a statsd/datadog agent over UDP
//! - [`LoggerClient`] writes a readable line per call, for local development
//! - [`NullClient`] discards everything
//! - [`MultiClient`] fans out to several clients at once
//! - [`RecorderClient`] keeps every call in memory so tests can assert on them
//!
//! Any client can also be installed as the global [`metrics`] recorder with [`install`].
//!
//! ## Testing with the recorder
//!
//! ```
//! use tagged_metrics::{Client, PanicFailer, RecorderClient};
//!
//! fn handle_request(client: &dyn Client) {
//!     client.with_tags(&[("route", "/home")]).incr("requests.count");
//! }
//!
//! let recorder = RecorderClient::new().with_test(PanicFailer);
//! handle_request(&recorder);
//!
//! recorder.expect("requests.count").value(1).tag("route", "/home");
//! recorder.if_id("requests.count").tag("route", "/admin").reject();
//! ```
//!
//! A failed assertion reports the message, every recorded call, and the calling code.
//!
//! ## Sending to an agent
//!
//! ```no_run
//! use tagged_metrics::DogStatsdBuilder;
//!
//! // If you're already inside a Tokio runtime, the exporter is spawned on it.  Otherwise a
//! // background thread running a single-threaded Tokio runtime is started.
//! let client = DogStatsdBuilder::new()
//!     .with_address("127.0.0.1:8125")
//!     .expect("invalid address")
//!     .set_namespace("myapp")
//!     .build()
//!     .expect("failed to build client");
//!
//! client.with_tags(&[("env", "prod")]).gauge("queue.depth", 12.0);
//! ```
//!
//! All naming conversions for [metrics] and [tags] are compliant with DataDog requirements.
//!
//! [tags]: https://docs.datadoghq.com/getting_started/tagging/#define-tags
//! [metrics]: https://docs.datadoghq.com/metrics/custom_metrics/#naming-custom-metrics
mod common;
pub use self::common::{BuildError, Error};

mod client;
pub use self::client::Client;

mod event;
pub use self::event::{AlertType, Event, Priority};

mod call;
pub use self::call::{Call, EventCall, MetricCall};

mod util;
pub use self::util::{tags_to_strings, Tags, ToFloat64};

mod query;
mod recorder;
mod stack;
pub use self::query::Query;
pub use self::recorder::{PanicFailer, RecorderClient, TestFailer};

pub mod formatting;
mod telemetry;

mod transport;
pub use self::transport::{Transport, UdpTransport};

mod builder;
mod datadog;
pub use self::builder::DogStatsdBuilder;
pub use self::datadog::DogStatsdClient;

mod logger;
pub use self::logger::{InfoLogger, LoggerClient, StdoutLogger, TracingLogger};

mod multi;
mod null;
pub use self::multi::MultiClient;
pub use self::null::NullClient;

mod bridge;
pub use self::bridge::{install, MetricsBridge};

#[cfg(test)]
mod test_util;
