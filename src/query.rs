use std::fmt::Write;
use std::sync::Arc;

use crate::call::Call;
use crate::recorder::{report, CallLog, TestFailer};
use crate::util::{CompactFloat, ToFloat64};

/// A chainable filter over the calls recorded by a [`RecorderClient`], used to write
/// tests that don't depend on metrics fired by unrelated upstream or downstream code.
///
/// ```
/// # use tagged_metrics::{PanicFailer, RecorderClient};
/// let recorder = RecorderClient::new().with_test(PanicFailer);
/// recorder.with_tags(&[("foo", "bar")]).incr("my.metric");
///
/// // A metric with the given value and tag must have been sent.
/// recorder.expect("my.metric").value(1).tag("foo", "bar");
///
/// // No metric with the given name and value may have been sent.
/// recorder.if_id("my.metric").value(100).reject();
/// ```
///
/// A query works on a copy of the call log taken when it was created; calls made
/// afterwards are not seen. Queries built with [`RecorderClient::expect`] or
/// [`RecorderClient::expect_contains`] check the minimum number of calls after every
/// filter, while those built with [`RecorderClient::if_id`] only check it in
/// [`accept`](Self::accept) or [`reject`](Self::reject). A query reports at most one
/// failure; once it has failed, later checks are skipped.
///
/// [`RecorderClient`]: crate::RecorderClient
/// [`RecorderClient::expect`]: crate::RecorderClient::expect
/// [`RecorderClient::expect_contains`]: crate::RecorderClient::expect_contains
/// [`RecorderClient::if_id`]: crate::RecorderClient::if_id
pub struct Query {
    calls: Vec<Call>,
    log: Arc<CallLog>,
    test: Arc<dyn TestFailer>,
    /// The minimum number of calls that should be left after filtering.
    min_calls: usize,
    /// Whether to check the minimum after each filter.
    check_min: bool,
    /// A readable trace of the filters applied so far.
    history: String,
    failed: bool,
}

impl Query {
    pub(crate) fn new(log: Arc<CallLog>, test: Arc<dyn TestFailer>, check_min: bool) -> Self {
        let calls = log.snapshot();
        Self {
            calls,
            log,
            test,
            min_calls: 1,
            check_min,
            history: String::new(),
            failed: false,
        }
    }

    /// The calls still matching.
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn into_calls(self) -> Vec<Call> {
        self.calls
    }

    /// Sets the minimum number of calls that must remain. The default is one, so if five
    /// calls are expected use `recorder.expect("my.metric").min_times(5)`.
    pub fn min_times(mut self, num: usize) -> Self {
        self.trace(format_args!("minTimes({})", num));
        self.min_calls = num;

        if self.check_min {
            self.accept_ref();
        }

        self
    }

    /// Keeps calls whose serialized representation contains `component`.
    pub fn contains(mut self, component: &str) -> Self {
        self.trace(format_args!("contains({})", component));
        self.calls
            .retain(|call| call.to_string().contains(component));
        self.check(|| format!("Expected metric or event to contain '{}'", component));
        self
    }

    /// Keeps metrics named `id` and events titled `id`. `*` matches any ID.
    pub fn id(mut self, id: &str) -> Self {
        self.trace(format_args!("id({})", id));
        if id != "*" {
            self.calls.retain(|call| call.id() == id);
        }
        self.check(|| format!("Expected metric or event with ID '{}'", id));
        self
    }

    /// Keeps metrics whose value equals `value`. All events are dropped.
    pub fn value<V: ToFloat64>(mut self, value: V) -> Self {
        let described = value.describe();
        let value = value.to_f64();
        self.trace(format_args!("value({})", described));
        self.calls.retain(|call| match call {
            Call::Metric(m) => m.value == value,
            Call::Event(_) => false,
        });
        self.check(|| format!("Expected metric value '{}'", described));
        self
    }

    /// Keeps metrics sent with the sample rate `rate`. All events are dropped.
    pub fn rate(mut self, rate: f64) -> Self {
        self.trace(format_args!("rate({})", CompactFloat(rate)));
        self.calls.retain(|call| match call {
            Call::Metric(m) => m.rate == rate,
            Call::Event(_) => false,
        });
        self.check(|| format!("Expected metric rate '{}'", CompactFloat(rate)));
        self
    }

    /// Keeps events whose text equals `text`. All metrics are dropped.
    pub fn text(mut self, text: &str) -> Self {
        self.trace(format_args!("text({})", text));
        self.calls.retain(|call| match call {
            Call::Event(e) => e.event.text == text,
            Call::Metric(_) => false,
        });
        self.check(|| format!("Expected event text '{}'", text));
        self
    }

    /// Keeps calls tagged with `name` set to `value`.
    pub fn tag(mut self, name: &str, value: &str) -> Self {
        self.trace(format_args!("tag({}, {})", name, value));
        self.calls
            .retain(|call| call.tags().get(name).map(String::as_str) == Some(value));
        self.check(|| format!("Expected tag '{}' with value '{}'", name, value));
        self
    }

    /// Keeps calls carrying a tag called `name`, whatever its value.
    pub fn tag_name(mut self, name: &str) -> Self {
        self.trace(format_args!("tag({})", name));
        self.calls.retain(|call| call.tags().contains_key(name));
        self.check(|| format!("Expected tag '{}'", name));
        self
    }

    /// Fails the test if fewer than the minimum number of calls are left.
    ///
    /// `recorder.if_id(..).accept()` is usually written `recorder.expect(..)` instead.
    pub fn accept(mut self) {
        self.accept_ref();
    }

    /// Fails the test if at least the minimum number of calls are left.
    pub fn reject(mut self) {
        if self.calls.len() >= self.min_calls {
            let message = format!(
                "Expected fewer than {} matching metrics but have '{}'",
                self.min_calls,
                self.joined()
            );
            self.fail(&message);
        }
    }

    fn accept_ref(&mut self) {
        if self.calls.len() >= self.min_calls {
            return;
        }
        let message = if self.calls.is_empty() {
            format!("Expected at least {} calls but have none", self.min_calls)
        } else {
            format!(
                "Expected at least {} calls but only have '{}'",
                self.min_calls,
                self.joined()
            )
        };
        self.fail(&message);
    }

    fn check<F: FnOnce() -> String>(&mut self, message: F) {
        if self.check_min && self.calls.len() < self.min_calls {
            self.fail(&message());
        }
    }

    fn trace(&mut self, op: std::fmt::Arguments<'_>) {
        if !self.history.is_empty() {
            self.history.push(' ');
        }
        let _ = self.history.write_fmt(op);
    }

    fn joined(&self) -> String {
        self.calls
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("', '")
    }

    fn fail(&mut self, message: &str) {
        if self.failed {
            return;
        }
        self.failed = true;
        let message = format!("{}. Query was '{}'.", message, self.history);
        report(&self.log, &*self.test, &message);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::event::Event;
    use crate::test_util::CollectFailer;
    use crate::RecorderClient;

    fn recorder() -> (RecorderClient, Arc<CollectFailer>) {
        let failer = Arc::new(CollectFailer::default());
        (RecorderClient::new().with_test(failer.clone()), failer)
    }

    /// Runs `handler` against a fresh recorder and returns the failure messages.
    fn failures(handler: impl FnOnce(&RecorderClient)) -> Vec<String> {
        let (recorder, failer) = recorder();
        handler(&recorder);
        failer.messages()
    }

    #[test]
    fn test_expect_wrong_name_fails() {
        let messages = failures(|r| {
            r.incr("one");
            r.expect("on2");
        });
        assert_eq!(messages.len(), 1);
        assert!(messages[0]
            .starts_with("Expected metric or event with ID 'on2'. Query was 'id(on2)'."));
        assert!(messages[0].contains("Current metrics stack:\none:1[]\n"));
    }

    #[test]
    fn test_expect_on_empty_log_fails_once() {
        let messages = failures(|r| {
            r.expect("test");
        });
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Current metrics stack:\n\nFrom call stack:\n"));

        let messages = failures(|r| {
            r.expect("*");
        });
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_wrong_tag_fails() {
        let messages = failures(|r| {
            r.with_tags(&[("foo", "1")]).incr("one");
            r.expect("one").tag("bar", "1");
        });
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with(
            "Expected tag 'bar' with value '1'. Query was 'id(one) tag(bar, 1)'."
        ));

        let messages = failures(|r| {
            r.with_tags(&[("foo", "1")]).incr("one");
            r.expect("one").tag_name("bar");
        });
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Expected tag 'bar'. Query was 'id(one) tag(bar)'."));
    }

    #[test]
    fn test_contains_fails() {
        let messages = failures(|r| {
            r.incr("one");
            r.expect_contains("b");
        });
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Expected metric or event to contain 'b'"));
    }

    #[test]
    fn test_metric_expected_but_event_found() {
        let messages = failures(|r| {
            r.event(Event::new("test", ""));
            r.expect("test").value(1);
        });
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Expected metric value '1'"));
    }

    #[test]
    fn test_text_drops_metrics() {
        let messages = failures(|r| {
            r.incr("test");
            r.event(Event::new("test", "body"));
            let calls = r.expect("test").text("body").into_calls();
            assert_eq!(calls.len(), 1);
            assert!(calls[0].as_event().is_some());
            r.expect("test").text("other");
        });
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Expected event text 'other'"));
    }

    #[test]
    fn test_min_times() {
        let (recorder, failer) = recorder();
        recorder.incr("foo");
        recorder.incr("foo");

        recorder.expect("foo").min_times(2);
        assert!(failer.messages().is_empty());

        recorder.expect("foo").min_times(3);
        let messages = failer.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with(
            "Expected at least 3 calls but only have 'foo:1[]', 'foo:1[]'. \
             Query was 'id(foo) minTimes(3)'."
        ));
    }

    #[test]
    fn test_min_times_after_value() {
        let messages = failures(|r| {
            r.count("foo", 5);
            r.count("foo", 2);
            r.incr("bar");

            // two are expected, but only one matches both the name and the value
            r.expect("foo").value(5.0).min_times(2);
        });
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Expected at least 2 calls but only have 'foo:5[]'"));
    }

    #[test]
    fn test_first_failure_short_circuits() {
        let messages = failures(|r| {
            r.incr("one");
            r.expect("missing").value(1).tag("a", "b").min_times(4);
        });
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Expected metric or event with ID 'missing'"));
    }

    #[test]
    fn test_rejection() {
        let (recorder, failer) = recorder();
        recorder.with_tags(&[("tag1", "1"), ("tag2", "2")]).incr("foo");
        recorder.incr("bar");

        recorder.if_id("baz").reject();
        // present, but only once
        recorder.if_id("foo").min_times(2).reject();
        recorder.if_id("foo").accept();
        recorder.if_id("foo").tag("tag1", "1").tag_name("tag2").accept();
        assert!(failer.messages().is_empty());

        recorder.if_id("foo").reject();
        let messages = failer.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with(
            "Expected fewer than 1 matching metrics but have 'foo:1[tag1:1 tag2:2]'. \
             Query was 'id(foo)'."
        ));

        recorder.if_id("qux").accept();
        let messages = failer.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].starts_with("Expected at least 1 calls but have none"));
    }

    #[test]
    fn test_reject_by_tag_value() {
        let (recorder, failer) = recorder();
        recorder.with_tags(&[("t", "1")]).incr("x");

        recorder.if_id("x").tag("t", "2").reject();
        assert!(failer.messages().is_empty());

        recorder.if_id("x").tag("t", "1").reject();
        assert_eq!(failer.messages().len(), 1);
    }

    #[test]
    fn test_wildcard_rejects_forbidden_tag_anywhere() {
        let (recorder, failer) = recorder();
        recorder.with_tags(&[("user", "a")]).incr("one");
        recorder.with_tags(&[("env", "prod")]).event(Event::new("two", "x"));

        recorder.if_id("*").tag_name("secret").reject();
        assert!(failer.messages().is_empty());

        recorder.if_id("*").tag("env", "prod").reject();
        assert_eq!(failer.messages().len(), 1);
    }

    #[test]
    fn test_if_does_not_check_until_terminal() {
        let (recorder, failer) = recorder();
        recorder.incr("one");

        let query = recorder.if_id("missing").value(3).tag("a", "b");
        assert!(query.calls().is_empty());
        assert!(failer.messages().is_empty());
        query.accept();
        assert_eq!(failer.messages().len(), 1);
    }

    #[test]
    fn test_query_is_a_snapshot() {
        let (recorder, failer) = recorder();
        recorder.incr("a");
        let query = recorder.if_id("a");
        recorder.incr("a");
        assert_eq!(query.calls().len(), 1);
        query.min_times(2).reject();
        assert!(failer.messages().is_empty());
    }

    #[test]
    fn test_filters_preserve_order() {
        let (recorder, _) = recorder();
        for value in [3, 1, 2, 1] {
            recorder.with_tags(&[("v", &value.to_string())]).count("n", value);
        }
        recorder.incr("other");

        let values: Vec<f64> = recorder
            .expect("n")
            .tag_name("v")
            .into_calls()
            .iter()
            .filter_map(|call| call.as_metric().map(|m| m.value))
            .collect();
        assert_eq!(values, [3.0, 1.0, 2.0, 1.0]);
    }

    #[test]
    fn test_failure_dumps_whole_log() {
        let messages = failures(|r| {
            r.incr("a");
            r.with_tags(&[("k", "v")]).gauge("b", 1.5);
            r.expect("a").value(2);
        });
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Current metrics stack:\na:1[]\nb:1.5[k:v]\n"));
    }

    #[test]
    fn test_durations_are_described_as_written() {
        let messages = failures(|r| {
            r.timing("three", Duration::from_secs(3));
            r.expect("three").value(Duration::from_secs(3));
            r.expect_contains("three:3e+09");
            r.expect("three").value(Duration::from_millis(2500));
        });
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with(
            "Expected metric value '2.5s'. Query was 'id(three) value(2.5s)'. \
             Current metrics stack:\nthree:3e+09[]\n"
        ));
    }

    #[test]
    fn test_rate_uses_compact_numbers() {
        let messages = failures(|r| {
            r.with_rate(0.5).incr("sampled");
            r.expect("sampled").rate(0.5);
            r.expect("sampled").rate(0.00001);
        });
        assert_eq!(messages.len(), 1);
        assert!(messages[0]
            .starts_with("Expected metric rate '1e-05'. Query was 'id(sampled) rate(1e-05)'."));
    }
}
