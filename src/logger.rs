use std::fmt::Display;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::client::Client;
use crate::common::Error;
use crate::event::Event;
use crate::util::{combine, sampled, CompactFloat, Tags};

// ANSI 256 color palette
const NAME_COLOR: u8 = 208;
const VALUE_COLOR: u8 = 32;
const RATE_COLOR: u8 = 106;
const EXTRAPOLATED_COLOR: u8 = 43;
const TAG_COLOR: u8 = 133;

fn paint(code: u8, text: &str) -> String {
    format!("\x1b[38;5;{}m{}\x1b[0m", code, text)
}

/// Receives the lines written by a [`LoggerClient`].
pub trait InfoLogger: Send + Sync {
    fn print(&self, line: &str);
}

/// Writes each line to stdout.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutLogger;

impl InfoLogger for StdoutLogger {
    fn print(&self, line: &str) {
        println!("{}", line);
    }
}

/// Emits each line as an `INFO` event through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl InfoLogger for TracingLogger {
    fn print(&self, line: &str) {
        info!("{}", line);
    }
}

/// A client that writes a human readable line per call. Useful when running locally.
///
/// ```
/// use tagged_metrics::{Client, LoggerClient};
///
/// let client = LoggerClient::new(None);
/// client.with_tags(&[("tag1", "value1")]).incr("requests.count");
/// // Count requests.count:1 map[tag1:value1]
/// ```
///
/// With a sample rate below `1.0` only that share of calls is logged. Counts are then
/// shown extrapolated as `value / rate`, with the recorded value and rate next to it;
/// every other kind shows its value unmodified followed by the rate.
#[derive(Clone)]
pub struct LoggerClient {
    logger: Arc<dyn InfoLogger>,
    colors: bool,
    rate: f64,
    tags: Tags,
}

impl LoggerClient {
    /// Creates a logging client. Without a logger, lines go to stdout and are colorized
    /// when stdout is a terminal.
    pub fn new(logger: Option<Arc<dyn InfoLogger>>) -> Self {
        let (logger, colors) = match logger {
            Some(logger) => (logger, false),
            None => (
                Arc::new(StdoutLogger) as Arc<dyn InfoLogger>,
                std::io::stdout().is_terminal(),
            ),
        };

        Self {
            logger,
            colors,
            rate: 1.0,
            tags: Tags::new(),
        }
    }

    /// Enables colored terminal output.
    pub fn colorized(&self) -> Self {
        Self {
            colors: true,
            ..self.clone()
        }
    }

    /// Clones this client with additional tags. Duplicate tags overwrite the existing value.
    pub fn with_tags(&self, tags: &[(&str, &str)]) -> Self {
        Self {
            tags: combine(&self.tags, tags),
            ..self.clone()
        }
    }

    /// Clones this client with a sample rate limiting how many calls get logged.
    pub fn with_rate(&self, rate: f64) -> Self {
        Self {
            rate,
            ..self.clone()
        }
    }

    fn print(&self, kind: &str, name: &str, value: impl Display, extrapolated: Option<f64>) {
        if !sampled(self.rate) {
            return;
        }

        let mut name = name.to_string();
        let mut value = value.to_string();
        let mut rate = CompactFloat(self.rate).to_string();
        let mut extrapolated = extrapolated.map(|e| CompactFloat(e).to_string());
        if self.colors {
            name = paint(NAME_COLOR, &name);
            value = paint(VALUE_COLOR, &value);
            rate = paint(RATE_COLOR, &rate);
            extrapolated = extrapolated.map(|e| paint(EXTRAPOLATED_COLOR, &e));
        }

        let tags = self.render_tags(self.colors);
        let line = if self.rate >= 1.0 {
            format!("{} {}:{} {}", kind, name, value, tags)
        } else if let Some(extrapolated) = extrapolated {
            format!("{} {}:{} ({} / {}) {}", kind, name, extrapolated, value, rate, tags)
        } else {
            format!("{} {}:{} ({}) {}", kind, name, value, rate, tags)
        };
        self.logger.print(&line);
    }

    fn render_tags(&self, colors: bool) -> String {
        let mut keys: Vec<&String> = self.tags.keys().collect();
        keys.sort();

        let tags: Vec<String> = keys
            .into_iter()
            .map(|key| {
                let value = &self.tags[key.as_str()];
                if colors {
                    format!("{}:{}", paint(TAG_COLOR, key), value)
                } else {
                    format!("{}:{}", key, value)
                }
            })
            .collect();
        format!("map[{}]", tags.join(" "))
    }

    pub fn count(&self, name: &str, value: i64) {
        self.print("Count", name, value, Some(value as f64 / self.rate));
    }

    pub fn incr(&self, name: &str) {
        self.count(name, 1);
    }

    pub fn decr(&self, name: &str) {
        self.count(name, -1);
    }

    pub fn gauge(&self, name: &str, value: f64) {
        self.print("Gauge", name, CompactFloat(value), None);
    }

    /// Events are always logged, whatever the sample rate.
    pub fn event(&self, event: Event) {
        self.logger.print(&format!(
            "Event {}\n{} {}",
            event.title,
            event.text,
            self.render_tags(false)
        ));
    }

    pub fn timing(&self, name: &str, value: Duration) {
        self.print("Timing", name, format!("{:?}", value), None);
    }

    pub fn histogram(&self, name: &str, value: f64) {
        self.print("Histogram", name, CompactFloat(value), None);
    }

    pub fn distribution(&self, name: &str, value: f64) {
        self.print("Distribution", name, CompactFloat(value), None);
    }
}

impl Client for LoggerClient {
    fn with_tags(&self, tags: &[(&str, &str)]) -> Box<dyn Client> {
        Box::new(LoggerClient::with_tags(self, tags))
    }

    fn with_rate(&self, rate: f64) -> Box<dyn Client> {
        Box::new(LoggerClient::with_rate(self, rate))
    }

    fn count(&self, name: &str, value: i64) {
        LoggerClient::count(self, name, value)
    }

    fn gauge(&self, name: &str, value: f64) {
        LoggerClient::gauge(self, name, value)
    }

    fn event(&self, event: Event) {
        LoggerClient::event(self, event)
    }

    fn timing(&self, name: &str, value: Duration) {
        LoggerClient::timing(self, name, value)
    }

    fn histogram(&self, name: &str, value: f64) {
        LoggerClient::histogram(self, name, value)
    }

    fn distribution(&self, name: &str, value: f64) {
        LoggerClient::distribution(self, name, value)
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}
