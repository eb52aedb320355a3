use std::time::Duration;

use crate::common::Error;
use crate::event::Event;

/// A generic interface to emit metrics and events.
///
/// Every backend in this crate implements it, so code can be written against
/// `Box<dyn Client>` and handed a [`DogStatsdClient`](crate::DogStatsdClient) in production,
/// a [`LoggerClient`](crate::LoggerClient) locally, and a
/// [`RecorderClient`](crate::RecorderClient) in tests.
///
/// Clients are cheap to derive: `with_tags` and `with_rate` never modify the receiver.
pub trait Client: Send + Sync {
    /// Returns a new client with the given tags added. Duplicate tags overwrite the
    /// existing value.
    fn with_tags(&self, tags: &[(&str, &str)]) -> Box<dyn Client>;

    /// Returns a new client with the given sample rate.
    fn with_rate(&self, rate: f64) -> Box<dyn Client>;

    /// Adds some integer value to a counter.
    fn count(&self, name: &str, value: i64);

    fn incr(&self, name: &str) {
        self.count(name, 1);
    }

    fn decr(&self, name: &str) {
        self.count(name, -1);
    }

    /// Sets a numeric floating point value.
    fn gauge(&self, name: &str, value: f64);

    /// Creates a new event, which allows additional information to be included when
    /// something worth calling out happens.
    fn event(&self, event: Event);

    /// Tracks a duration.
    fn timing(&self, name: &str, value: Duration);

    /// Tracks a value with min/max/avg/p95/etc computed by the backend.
    fn histogram(&self, name: &str, value: f64);

    /// Tracks the statistical distribution of a set of values.
    fn distribution(&self, name: &str, value: f64);

    /// Closes all connections and flushes any buffered data.
    fn close(&self) -> Result<(), Error>;
}
