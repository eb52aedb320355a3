use std::time::Duration;

use crate::client::Client;
use crate::common::Error;
use crate::event::Event;

/// Forwards every call to each of the wrapped clients, in order.
///
/// Useful to e.g. send to the daemon and log locally at the same time.
pub struct MultiClient {
    clients: Vec<Box<dyn Client>>,
}

impl MultiClient {
    pub fn new(clients: Vec<Box<dyn Client>>) -> Self {
        Self { clients }
    }
}

impl Client for MultiClient {
    fn with_tags(&self, tags: &[(&str, &str)]) -> Box<dyn Client> {
        Box::new(MultiClient::new(
            self.clients.iter().map(|c| c.with_tags(tags)).collect(),
        ))
    }

    fn with_rate(&self, rate: f64) -> Box<dyn Client> {
        Box::new(MultiClient::new(
            self.clients.iter().map(|c| c.with_rate(rate)).collect(),
        ))
    }

    fn count(&self, name: &str, value: i64) {
        for client in &self.clients {
            client.count(name, value);
        }
    }

    fn incr(&self, name: &str) {
        for client in &self.clients {
            client.incr(name);
        }
    }

    fn decr(&self, name: &str) {
        for client in &self.clients {
            client.decr(name);
        }
    }

    fn gauge(&self, name: &str, value: f64) {
        for client in &self.clients {
            client.gauge(name, value);
        }
    }

    fn event(&self, event: Event) {
        for client in &self.clients {
            client.event(event.clone());
        }
    }

    fn timing(&self, name: &str, value: Duration) {
        for client in &self.clients {
            client.timing(name, value);
        }
    }

    fn histogram(&self, name: &str, value: f64) {
        for client in &self.clients {
            client.histogram(name, value);
        }
    }

    fn distribution(&self, name: &str, value: f64) {
        for client in &self.clients {
            client.distribution(name, value);
        }
    }

    /// Closes every client, returning the first error.
    fn close(&self) -> Result<(), Error> {
        let mut result = Ok(());
        for client in &self.clients {
            let closed = client.close();
            if result.is_ok() {
                result = closed;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::logger::LoggerClient;
    use crate::null::NullClient;
    use crate::recorder::RecorderClient;
    use crate::test_util::LogCollector;

    struct FailingClient;

    impl Client for FailingClient {
        fn with_tags(&self, _tags: &[(&str, &str)]) -> Box<dyn Client> {
            Box::new(FailingClient)
        }
        fn with_rate(&self, _rate: f64) -> Box<dyn Client> {
            Box::new(FailingClient)
        }
        fn count(&self, _name: &str, _value: i64) {}
        fn gauge(&self, _name: &str, _value: f64) {}
        fn event(&self, _event: Event) {}
        fn timing(&self, _name: &str, _value: Duration) {}
        fn histogram(&self, _name: &str, _value: f64) {}
        fn distribution(&self, _name: &str, _value: f64) {}
        fn close(&self) -> Result<(), Error> {
            Err(Error::Closed)
        }
    }

    #[test]
    fn test_multi_client() {
        let r1 = Arc::new(LogCollector::default());
        let r2 = Arc::new(LogCollector::default());

        let client = MultiClient::new(vec![
            Box::new(LoggerClient::new(Some(r1.clone()))),
            Box::new(LoggerClient::new(Some(r2.clone()))),
        ]);
        client.incr("count");
        client.decr("count");
        client.count("count", 5);
        client.gauge("gauge", 10.0);
        client.histogram("histo", 1.25);
        client.timing("timing", Duration::from_nanos(123));
        client.event(Event::default());
        client.with_tags(&[("a", "b")]).with_rate(1.2).incr("rated");

        assert_eq!(r1.lines().len(), 8);
        assert_eq!(r1.lines(), r2.lines());
        assert_eq!(r1.lines()[7], "Count rated:1 map[a:b]");
    }

    #[test]
    fn test_multi_client_records() {
        let recorder = RecorderClient::new();
        let client = MultiClient::new(vec![
            Box::new(recorder.clone()),
            Box::new(NullClient::new()),
            Box::new(recorder.clone()),
        ]);
        client.with_tags(&[("t", "1")]).incr("x");

        assert_eq!(recorder.len(), 2);
    }

    #[test]
    fn test_close_returns_first_error() {
        let r1 = Arc::new(LogCollector::default());
        let client = MultiClient::new(vec![
            Box::new(NullClient::new()),
            Box::new(FailingClient),
            Box::new(LoggerClient::new(Some(r1.clone()))),
        ]);
        assert!(matches!(client.close(), Err(Error::Closed)));
    }
}
