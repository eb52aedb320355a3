/// Priority of an [`Event`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Normal,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

/// Alert level of an [`Event`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AlertType {
    #[default]
    Info,
    Error,
    Warning,
    Success,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Info => "info",
            AlertType::Error => "error",
            AlertType::Warning => "warning",
            AlertType::Success => "success",
        }
    }
}

/// An event, which carries additional information about something worth calling out
/// next to the regular metrics.
///
/// Only `title` and `text` are required; everything else is optional and is passed
/// through to backends that understand it.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Event {
    pub title: String,
    pub text: String,
    /// Unix timestamp, in seconds.
    pub timestamp: Option<u64>,
    pub hostname: Option<String>,
    pub aggregation_key: Option<String>,
    pub priority: Priority,
    pub source_type_name: Option<String>,
    pub alert_type: AlertType,
    /// Tags carried by the event itself, as `key:value` strings.
    pub tags: Vec<String>,
}

impl Event {
    pub fn new<T, D>(title: T, text: D) -> Self
    where
        T: Into<String>,
        D: Into<String>,
    {
        Self {
            title: title.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn with_hostname<H: Into<String>>(mut self, hostname: H) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    #[must_use]
    pub fn with_aggregation_key<K: Into<String>>(mut self, key: K) -> Self {
        self.aggregation_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_source_type_name<S: Into<String>>(mut self, source: S) -> Self {
        self.source_type_name = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_alert_type(mut self, alert_type: AlertType) -> Self {
        self.alert_type = alert_type;
        self
    }

    #[must_use]
    pub fn with_tag<K, V>(mut self, key: K, value: V) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.tags
            .push(crate::util::build_tag(key.as_ref(), value.as_ref()));
        self
    }
}
