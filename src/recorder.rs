use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::call::{Call, EventCall, MetricCall};
use crate::client::Client;
use crate::common::Error;
use crate::event::Event;
use crate::query::Query;
use crate::stack::call_site_blurb;
use crate::util::{combine, Tags, ToFloat64};

const MISSING_TEST: &str =
    "no test associated with metrics recorder, you must call `recorder.with_test(...)`";

/// Fails the currently running test.
///
/// The recorder funnels every failed assertion through this single method. Implementations
/// may panic (which is how a Rust test fails) or record the message and return; when the
/// method returns, the failing query stops reporting further failures.
pub trait TestFailer: Send + Sync {
    fn fatal(&self, message: &str);
}

impl<T: TestFailer + ?Sized> TestFailer for Arc<T> {
    fn fatal(&self, message: &str) {
        (**self).fatal(message)
    }
}

impl<T: TestFailer + ?Sized> TestFailer for Box<T> {
    fn fatal(&self, message: &str) {
        (**self).fatal(message)
    }
}

/// A [`TestFailer`] that panics with the failure message.
#[derive(Clone, Copy, Debug, Default)]
pub struct PanicFailer;

impl TestFailer for PanicFailer {
    fn fatal(&self, message: &str) {
        panic!("{}", message);
    }
}

#[derive(Default)]
pub(crate) struct CallLog {
    calls: RwLock<Vec<Call>>,
}

impl CallLog {
    fn push(&self, call: Call) {
        self.calls.write().push(call);
    }

    fn clear(&self) {
        self.calls.write().clear();
    }

    fn len(&self) -> usize {
        self.calls.read().len()
    }

    pub(crate) fn snapshot(&self) -> Vec<Call> {
        self.calls.read().clone()
    }

    /// One serialized call per line.
    pub(crate) fn dump(&self) -> String {
        let calls = self.calls.read();
        let mut out = String::new();
        for (i, call) in calls.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&call.to_string());
        }
        out
    }
}

/// Fails `test` with `message`, the whole call log, and the calling code's stack.
///
/// The log lock is released before the failer runs.
pub(crate) fn report(log: &CallLog, test: &dyn TestFailer, message: &str) {
    let dump = log.dump();
    let blurb = call_site_blurb();
    test.fatal(&format!(
        "{} Current metrics stack:\n{}\nFrom call stack:\n{}",
        message, dump, blurb
    ));
}

/// Records every metric and event that is sent, allowing assertions about the metrics
/// flowing out of a service.
///
/// All clients derived from one [`RecorderClient::new`] through `with_tags`, `with_rate`,
/// or `with_test` share the same call log, whichever handle performed the write.
///
/// ## Assertions
///
/// Assertions produce consistent output on failure: the failing condition, the full
/// list of recorded calls, and the lines of test code that led to it.
///
/// ```
/// use tagged_metrics::{PanicFailer, RecorderClient};
///
/// let recorder = RecorderClient::new().with_test(PanicFailer);
/// recorder.count("my.metric", 5);
///
/// recorder.expect("my.metric").value(5);
///
/// // A value of 10 was never sent, so this passes.
/// recorder.if_id("my.metric").value(10).reject();
/// ```
///
/// ## Custom checks
///
/// Individual calls are available for checks the query methods can't express:
///
/// ```
/// use tagged_metrics::{PanicFailer, RecorderClient};
///
/// let recorder = RecorderClient::new().with_test(PanicFailer);
/// recorder.count("foo", 1);
/// recorder.count("foo", 2);
///
/// let values: Vec<f64> = recorder
///     .expect("foo")
///     .calls()
///     .iter()
///     .filter_map(|call| call.as_metric().map(|m| m.value))
///     .collect();
/// if values != [1.0, 2.0] {
///     recorder.fatal("Expected values '1, 2' in order.");
/// }
/// ```
#[derive(Clone)]
pub struct RecorderClient {
    log: Arc<CallLog>,
    test: Option<Arc<dyn TestFailer>>,
    rate: f64,
    tags: Tags,
}

impl RecorderClient {
    pub fn new() -> Self {
        Self {
            log: Arc::new(CallLog::default()),
            test: None,
            rate: 1.0,
            tags: Tags::new(),
        }
    }

    /// Clones this client with additional tags. Duplicate tags overwrite the existing value.
    pub fn with_tags(&self, tags: &[(&str, &str)]) -> Self {
        Self {
            log: self.log.clone(),
            test: self.test.clone(),
            rate: self.rate,
            tags: combine(&self.tags, tags),
        }
    }

    /// Clones this client with a new sample rate.
    pub fn with_rate(&self, rate: f64) -> Self {
        Self {
            log: self.log.clone(),
            test: self.test.clone(),
            rate,
            tags: self.tags.clone(),
        }
    }

    /// Clones this client, linking it with the test that assertions should fail.
    pub fn with_test<T: TestFailer + 'static>(&self, test: T) -> Self {
        Self {
            log: self.log.clone(),
            test: Some(Arc::new(test)),
            rate: self.rate,
            tags: self.tags.clone(),
        }
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    fn log_call<V: ToFloat64>(&self, name: &str, value: V) {
        // built before taking the lock
        let call = MetricCall {
            name: name.to_string(),
            value: value.to_f64(),
            rate: self.rate,
            tags: self.tags.clone(),
        };
        self.log.push(call.into());
    }

    /// Adds some value to a metric. It is stored as a float so that assertions don't
    /// depend on the kind of metric.
    pub fn count(&self, name: &str, value: i64) {
        self.log_call(name, value);
    }

    pub fn incr(&self, name: &str) {
        self.count(name, 1);
    }

    pub fn decr(&self, name: &str) {
        self.count(name, -1);
    }

    pub fn gauge(&self, name: &str, value: f64) {
        self.log_call(name, value);
    }

    /// Records an event. Events are never sampled, so the rate isn't kept.
    pub fn event(&self, event: Event) {
        let call = EventCall {
            event,
            tags: self.tags.clone(),
        };
        self.log.push(call.into());
    }

    /// Records a duration as its number of nanoseconds.
    pub fn timing(&self, name: &str, value: Duration) {
        self.log_call(name, value);
    }

    pub fn histogram(&self, name: &str, value: f64) {
        self.log_call(name, value);
    }

    pub fn distribution(&self, name: &str, value: f64) {
        self.log_call(name, value);
    }

    /// Clears the shared call log, which is useful between test runs.
    pub fn reset(&self) {
        self.log.clear();
    }

    /// The number of calls in the shared call log.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of every recorded call, in the order they were made.
    pub fn calls(&self) -> Vec<Call> {
        self.log.snapshot()
    }

    fn test(&self) -> Arc<dyn TestFailer> {
        match &self.test {
            Some(test) => test.clone(),
            None => panic!("{}", MISSING_TEST),
        }
    }

    /// Fails the attached test, appending the recorded calls and the calling code to
    /// `message`.
    ///
    /// ## Panics
    ///
    /// Panics if no test was attached with [`with_test`](Self::with_test).
    pub fn fatal(&self, message: &str) {
        let test = self.test();
        report(&self.log, &*test, message);
    }

    /// Asserts that no metrics or events have been recorded.
    pub fn expect_empty(&self) {
        let test = self.test();
        if !self.is_empty() {
            report(&self.log, &*test, "Expected empty metrics call stack.");
        }
    }

    /// Finds metrics by name or events by title. The wildcard `*` matches any ID.
    ///
    /// The query fails the test as soon as fewer than the minimum number of calls
    /// (default one) remain. Matching calls stay in the call log.
    pub fn expect(&self, id: &str) -> Query {
        Query::new(self.log.clone(), self.test(), true).id(id)
    }

    /// Finds metrics or events whose serialized form contains `component`.
    ///
    /// ```
    /// # use tagged_metrics::{PanicFailer, RecorderClient};
    /// let recorder = RecorderClient::new().with_test(PanicFailer);
    /// recorder.incr("foo1");
    /// recorder.incr("foo2");
    ///
    /// // matches both calls
    /// recorder.expect_contains("foo").min_times(2);
    /// ```
    pub fn expect_contains(&self, component: &str) -> Query {
        Query::new(self.log.clone(), self.test(), true).contains(component)
    }

    /// Acts like [`expect`](Self::expect), but only checks the minimum number of calls
    /// when [`Query::accept`] or [`Query::reject`] is called.
    ///
    /// ```
    /// # use tagged_metrics::{PanicFailer, RecorderClient};
    /// let recorder = RecorderClient::new().with_test(PanicFailer);
    /// recorder.with_tags(&[("good", "tag")]).incr("my.metric");
    ///
    /// // The bad tag is never sent, so this passes.
    /// recorder.if_id("my.metric").tag("bad", "tag").reject();
    ///
    /// // Equivalent to `recorder.expect("my.metric")`.
    /// recorder.if_id("my.metric").accept();
    /// ```
    pub fn if_id(&self, id: &str) -> Query {
        Query::new(self.log.clone(), self.test(), false).id(id)
    }
}

impl Default for RecorderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecorderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderClient")
            .field("calls", &self.len())
            .field("has_test", &self.test.is_some())
            .field("rate", &self.rate)
            .field("tags", &self.tags)
            .finish()
    }
}

impl Client for RecorderClient {
    fn with_tags(&self, tags: &[(&str, &str)]) -> Box<dyn Client> {
        Box::new(RecorderClient::with_tags(self, tags))
    }

    fn with_rate(&self, rate: f64) -> Box<dyn Client> {
        Box::new(RecorderClient::with_rate(self, rate))
    }

    fn count(&self, name: &str, value: i64) {
        RecorderClient::count(self, name, value)
    }

    fn gauge(&self, name: &str, value: f64) {
        RecorderClient::gauge(self, name, value)
    }

    fn event(&self, event: Event) {
        RecorderClient::event(self, event)
    }

    fn timing(&self, name: &str, value: Duration) {
        RecorderClient::timing(self, name, value)
    }

    fn histogram(&self, name: &str, value: f64) {
        RecorderClient::histogram(self, name, value)
    }

    fn distribution(&self, name: &str, value: f64) {
        RecorderClient::distribution(self, name, value)
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}
