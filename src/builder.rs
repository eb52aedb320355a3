use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use quanta::Clock;

use crate::common::BuildError;
use crate::datadog::{DogStatsdClient, Inner};
use crate::telemetry::Telemetry;
use crate::transport::{Transport, UdpTransport};

/// Builder for creating a [`DogStatsdClient`].
pub struct DogStatsdBuilder {
    endpoint: Option<SocketAddr>,
    transport: Option<Arc<dyn Transport>>,
    namespace: Option<String>,
    telemetry: bool,
    max_packet_size: usize,
    flush_interval: Duration,
    telemetry_interval: Duration,
}

impl DogStatsdBuilder {
    /// Creates a new [`DogStatsdBuilder`].
    pub fn new() -> Self {
        Self {
            endpoint: None,
            transport: None,
            namespace: None,
            telemetry: true,
            max_packet_size: 1432,
            flush_interval: Duration::from_millis(100),
            telemetry_interval: Duration::from_secs(10),
        }
    }

    /// Sends metrics over UDP to the daemon listening at `address`.
    ///
    /// ## Errors
    ///
    /// If the given address cannot be resolved into a valid SocketAddr, an error variant
    /// will be returned describing the error.
    pub fn with_address<T>(mut self, address: T) -> Result<Self, BuildError>
    where
        T: ToSocketAddrs,
    {
        let endpoint = address
            .to_socket_addrs()
            .map_err(|e| BuildError::InvalidAddress(e.to_string()))?
            .next() // just use the first address we resolve to
            .ok_or_else(|| {
                BuildError::InvalidAddress("address resolved to no socket address".to_string())
            })?;

        self.endpoint = Some(endpoint);
        Ok(self)
    }

    /// Uses an externally supplied transport instead of UDP. Takes precedence over
    /// [`with_address`](Self::with_address).
    #[must_use]
    pub fn with_transport<T>(mut self, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Adds a prefix to every metric name.
    ///
    /// Given a namespace of `foo.bar`, `incr("baz")` emits a metric called `foo.bar.baz`.
    /// An empty namespace is the same as none.
    #[must_use]
    pub fn set_namespace<P>(mut self, namespace: P) -> Self
    where
        P: Into<String>,
    {
        let namespace = namespace.into();
        self.namespace = if namespace.is_empty() {
            None
        } else {
            Some(namespace)
        };
        self
    }

    /// Disables the built-in client telemetry.
    #[must_use]
    pub fn without_telemetry(mut self) -> Self {
        self.telemetry = false;
        self
    }

    /// Sets the maximum size of UDP packets going out to the daemon.
    ///
    /// Defaults to 1432 bytes
    #[must_use]
    pub fn set_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }

    /// Sets how often buffered UDP datagrams are sent when packets aren't filling up.
    ///
    /// Defaults to 100 milliseconds
    #[must_use]
    pub fn set_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets how often client telemetry is sent.
    ///
    /// Defaults to 10 seconds
    #[must_use]
    pub fn set_telemetry_interval(mut self, interval: Duration) -> Self {
        self.telemetry_interval = interval;
        self
    }

    /// Builds the client.
    ///
    /// With a UDP address, this starts the exporter: when called from within a Tokio
    /// runtime it is spawned on that runtime, otherwise on a background thread.
    ///
    /// ## Errors
    ///
    /// If neither an address nor a transport was configured, or the exporter could not be
    /// started, an error variant will be returned describing the error.
    pub fn build(self) -> Result<DogStatsdClient, BuildError> {
        self.build_with_clock(Clock::new())
    }

    pub(crate) fn build_with_clock(self, clock: Clock) -> Result<DogStatsdClient, BuildError> {
        let kind = match (&self.transport, self.endpoint) {
            (Some(transport), _) => transport.kind().to_string(),
            (None, Some(_)) => "udp".to_string(),
            (None, None) => return Err(BuildError::MissingTransport),
        };

        let telemetry = self
            .telemetry
            .then(|| Arc::new(Telemetry::new(clock, self.telemetry_interval, &kind)));

        let transport: Arc<dyn Transport> = match (self.transport, self.endpoint) {
            (Some(transport), _) => transport,
            (None, Some(endpoint)) => Arc::new(UdpTransport::spawn(
                endpoint,
                self.max_packet_size,
                self.flush_interval,
                telemetry.clone(),
            )?),
            (None, None) => return Err(BuildError::MissingTransport),
        };

        Ok(DogStatsdClient::from(Inner {
            namespace: self.namespace,
            transport,
            telemetry,
        }))
    }
}

impl Default for DogStatsdBuilder {
    fn default() -> Self {
        DogStatsdBuilder::new()
    }
}

impl fmt::Debug for DogStatsdBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DogStatsdBuilder")
            .field("endpoint", &self.endpoint)
            .field("has_transport", &self.transport.is_some())
            .field("namespace", &self.namespace)
            .field("telemetry", &self.telemetry)
            .field("max_packet_size", &self.max_packet_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_transport() {
        let err = DogStatsdBuilder::new().build().unwrap_err();
        assert!(matches!(err, BuildError::MissingTransport));

        let without_address = DogStatsdBuilder::new().set_namespace("app").build();
        assert!(matches!(without_address, Err(BuildError::MissingTransport)));
    }

    #[test]
    fn test_invalid_address() {
        let err = DogStatsdBuilder::new()
            .with_address("not an address")
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidAddress(_)));
    }

    #[test]
    fn test_empty_namespace_is_none() {
        let builder = DogStatsdBuilder::new().set_namespace("");
        assert!(builder.namespace.is_none());
        let builder = builder.set_namespace("app");
        assert_eq!(builder.namespace.as_deref(), Some("app"));
    }
}
