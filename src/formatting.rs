#![allow(clippy::too_many_arguments)]
use crate::event::{AlertType, Event, Priority};
use crate::util::{tags_to_strings, Tags};

// <METRIC_NAME>:<VALUE>|<TYPE>|@<SAMPLE_RATE>|#<TAG_KEY_1>:<TAG_VALUE_1>,<TAG_2>
// _e{<TITLE_LEN>,<TEXT_LEN>}:<TITLE>|<TEXT>|d:<TS>|h:<HOST>|k:<KEY>|p:<PRIO>|s:<SRC>|t:<ALERT>|#<TAGS>

/// The statsd type of a metric line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricType {
    Count,
    Gauge,
    Timing,
    Histogram,
    Distribution,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Count => "c",
            MetricType::Gauge => "g",
            MetricType::Timing => "ms",
            MetricType::Histogram => "h",
            MetricType::Distribution => "d",
        }
    }
}

/// Replaces the characters that delimit fields of a datagram in a metric name.
pub fn sanitize_metric_name(name: &str) -> String {
    name.chars()
        .map(|c| if invalid_name_character(c) { '_' } else { c })
        .collect()
}

/// Replaces the characters that delimit tags in a datagram.
pub fn sanitize_tag(tag: &str) -> String {
    tag.chars()
        .map(|c| if invalid_tag_character(c) { '_' } else { c })
        .collect()
}

/// Renders client tags as sanitized, sorted `key:value` strings.
pub fn render_tags(tags: &Tags) -> Vec<String> {
    tags_to_strings(tags)
        .iter()
        .map(|tag| sanitize_tag(tag))
        .collect()
}

/// Appends one metric datagram line to `buffer`.
///
/// `sample_rate` is only written when it is below `1.0`.
pub fn write_metric_line<T>(
    buffer: &mut String,
    namespace: Option<&str>,
    name: &str,
    value: T,
    mtype: MetricType,
    sample_rate: f64,
    tags: &[String],
) where
    T: std::fmt::Display,
{
    if let Some(ns) = namespace {
        buffer.push_str(sanitize_metric_name(ns).as_str());
        buffer.push('.');
    }
    buffer.push_str(sanitize_metric_name(name).as_str());

    buffer.push(':');
    buffer.push_str(value.to_string().as_str());
    buffer.push('|');
    buffer.push_str(mtype.as_str());

    if sample_rate < 1.0 {
        buffer.push_str("|@");
        buffer.push_str(sample_rate.to_string().as_str());
    }

    write_tags(buffer, tags);
}

/// Appends one event datagram line to `buffer`. `extra_tags` follow the event's own tags.
pub fn write_event_line(buffer: &mut String, event: &Event, extra_tags: &[String]) {
    let title = escape_event_text(&event.title);
    let text = escape_event_text(&event.text);

    buffer.push_str(&format!("_e{{{},{}}}:", title.len(), text.len()));
    buffer.push_str(&title);
    buffer.push('|');
    buffer.push_str(&text);

    if let Some(ts) = event.timestamp {
        buffer.push_str(&format!("|d:{}", ts));
    }
    if let Some(host) = &event.hostname {
        buffer.push_str("|h:");
        buffer.push_str(host);
    }
    if let Some(key) = &event.aggregation_key {
        buffer.push_str("|k:");
        buffer.push_str(key);
    }
    if event.priority != Priority::Normal {
        buffer.push_str("|p:");
        buffer.push_str(event.priority.as_str());
    }
    if let Some(source) = &event.source_type_name {
        buffer.push_str("|s:");
        buffer.push_str(source);
    }
    if event.alert_type != AlertType::Info {
        buffer.push_str("|t:");
        buffer.push_str(event.alert_type.as_str());
    }

    let tags: Vec<String> = event
        .tags
        .iter()
        .map(|tag| sanitize_tag(tag))
        .chain(extra_tags.iter().cloned())
        .collect();
    write_tags(buffer, &tags);
}

fn write_tags(buffer: &mut String, tags: &[String]) {
    if !tags.is_empty() {
        buffer.push_str("|#");

        let mut first = true;
        for tag in tags {
            if first {
                first = false;
            } else {
                buffer.push(',');
            }
            buffer.push_str(tag);
        }
    }
}

/// Newlines would end the datagram, so they are sent escaped.
fn escape_event_text(text: &str) -> String {
    text.replace('\n', "\\n")
}

#[inline]
fn invalid_name_character(c: char) -> bool {
    matches!(c, ':' | '|' | '@' | '#' | ',' | '\n' | '\r') || c.is_whitespace()
}

#[inline]
fn invalid_tag_character(c: char) -> bool {
    matches!(c, '|' | ',' | '#' | '\n' | '\r')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::combine;

    #[test]
    fn test_metric_lines() {
        let mut buffer = String::new();
        write_metric_line(&mut buffer, None, "one", 1, MetricType::Count, 1.0, &[]);
        assert_eq!(buffer, "one:1|c");

        let tags = render_tags(&combine(&Tags::new(), &[("b", "2"), ("a", "1")]));
        let mut buffer = String::new();
        write_metric_line(
            &mut buffer,
            Some("prefix"),
            "memory",
            1024.5,
            MetricType::Gauge,
            0.5,
            &tags,
        );
        assert_eq!(buffer, "prefix.memory:1024.5|g|@0.5|#a:1,b:2");
    }

    #[test]
    fn test_sanitized_names_and_tags() {
        assert_eq!(sanitize_metric_name("yee haw:lets|go"), "yee_haw_lets_go");
        assert_eq!(sanitize_metric_name("requests.count"), "requests.count");
        assert_eq!(sanitize_tag("env:prod|eu,west"), "env:prod_eu_west");
    }

    #[test]
    fn test_event_line() {
        let mut buffer = String::new();
        let event = Event::new("title", "line one\nline two");
        write_event_line(&mut buffer, &event, &[]);
        assert_eq!(buffer, "_e{5,18}:title|line one\\nline two");

        let event = Event::new("deploy", "done")
            .with_timestamp(1_600_000_000)
            .with_hostname("host-1")
            .with_aggregation_key("deploys")
            .with_priority(Priority::Low)
            .with_source_type_name("ci")
            .with_alert_type(AlertType::Success)
            .with_tag("own", "tag");
        let mut buffer = String::new();
        write_event_line(&mut buffer, &event, &["tag1:value1".to_string()]);
        assert_eq!(
            buffer,
            "_e{6,4}:deploy|done|d:1600000000|h:host-1|k:deploys|p:low|s:ci|t:success|#own:tag,tag1:value1"
        );
    }
}
