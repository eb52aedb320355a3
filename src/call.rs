//! The recorded form of every metric or event emitted through a [`RecorderClient`].
//!
//! Converting a [`Call`] to a string yields its serialized representation, which is used
//! both in failure output and by [`Query::contains`]. The `(RATE)` segment is only
//! present when the rate isn't `1.0`, and tags are always sorted:
//!
//! ```text
//! NAME:VALUE(RATE)[TAG_NAME:TAG_VALUE TAG_NAME:TAG_VALUE ...]
//! TITLE:TEXT[TAG_NAME:TAG_VALUE TAG_NAME:TAG_VALUE ...]
//! ```
//!
//! [`RecorderClient`]: crate::RecorderClient
//! [`Query::contains`]: crate::Query::contains
use std::fmt;

use crate::event::Event;
use crate::util::{tags_to_strings, CompactFloat, Tags};

/// A single metric call. Every value is stored as `f64`, whatever kind was passed in.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricCall {
    pub name: String,
    pub value: f64,
    pub rate: f64,
    pub tags: Tags,
}

/// A single event call, with the tags of the client that emitted it.
#[derive(Clone, Debug, PartialEq)]
pub struct EventCall {
    pub event: Event,
    pub tags: Tags,
}

/// Either a metric or an event call.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Metric(MetricCall),
    Event(EventCall),
}

impl Call {
    /// The metric name or the event title.
    pub fn id(&self) -> &str {
        match self {
            Call::Metric(m) => &m.name,
            Call::Event(e) => &e.event.title,
        }
    }

    pub fn tags(&self) -> &Tags {
        match self {
            Call::Metric(m) => &m.tags,
            Call::Event(e) => &e.tags,
        }
    }

    pub fn as_metric(&self) -> Option<&MetricCall> {
        match self {
            Call::Metric(m) => Some(m),
            Call::Event(_) => None,
        }
    }

    pub fn as_event(&self) -> Option<&EventCall> {
        match self {
            Call::Event(e) => Some(e),
            Call::Metric(_) => None,
        }
    }
}

fn write_tags(f: &mut fmt::Formatter<'_>, tags: &Tags) -> fmt::Result {
    write!(f, "[{}]", tags_to_strings(tags).join(" "))
}

impl fmt::Display for MetricCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, CompactFloat(self.value))?;
        if self.rate != 1.0 {
            write!(f, "({})", CompactFloat(self.rate))?;
        }
        write_tags(f, &self.tags)
    }
}

impl fmt::Display for EventCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.event.title, self.event.text)?;
        write_tags(f, &self.tags)
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Call::Metric(m) => m.fmt(f),
            Call::Event(e) => e.fmt(f),
        }
    }
}

impl From<MetricCall> for Call {
    fn from(call: MetricCall) -> Self {
        Call::Metric(call)
    }
}

impl From<EventCall> for Call {
    fn from(call: EventCall) -> Self {
        Call::Event(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(name: &str, value: f64, rate: f64, tags: &[(&str, &str)]) -> Call {
        MetricCall {
            name: name.to_string(),
            value,
            rate,
            tags: crate::util::combine(&Tags::new(), tags),
        }
        .into()
    }

    #[test]
    fn test_metric_display() {
        assert_eq!(metric("foo", 5.0, 1.0, &[]).to_string(), "foo:5[]");
        assert_eq!(metric("histo", 4.3, 1.0, &[]).to_string(), "histo:4.3[]");
        assert_eq!(metric("one", -1.0, 1.0, &[]).to_string(), "one:-1[]");
        assert_eq!(
            metric("sampled", 1.0, 0.1, &[("b", "2"), ("a", "1")]).to_string(),
            "sampled:1(0.1)[a:1 b:2]"
        );
        assert_eq!(
            metric("requests.count", 1.0, 1.0, &[("tag2", "value2"), ("tag1", "value1")])
                .to_string(),
            "requests.count:1[tag1:value1 tag2:value2]"
        );
    }

    #[test]
    fn test_large_and_small_values_use_exponents() {
        assert_eq!(metric("big", 1_000_000.0, 1.0, &[]).to_string(), "big:1e+06[]");
        assert_eq!(
            metric("three", 3_000_000_000.0, 1.0, &[]).to_string(),
            "three:3e+09[]"
        );
        assert_eq!(metric("tiny", 0.00001, 1.0, &[]).to_string(), "tiny:1e-05[]");
        assert_eq!(metric("edge", 999_999.0, 0.00001, &[]).to_string(), "edge:999999(1e-05)[]");
    }

    #[test]
    fn test_event_display() {
        let call = Call::Event(EventCall {
            event: Event::new("title", "desc"),
            tags: crate::util::combine(&Tags::new(), &[("tag1", "value1")]),
        });
        assert_eq!(call.to_string(), "title:desc[tag1:value1]");
        assert_eq!(call.id(), "title");
        assert!(call.as_metric().is_none());
        assert_eq!(call.as_event().map(|e| e.event.text.as_str()), Some("desc"));
    }
}
