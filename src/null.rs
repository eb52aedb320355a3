use std::time::Duration;

use crate::client::Client;
use crate::common::Error;
use crate::event::Event;

/// A client that discards everything, for when metrics are turned off.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullClient;

impl NullClient {
    pub fn new() -> Self {
        NullClient
    }
}

impl Client for NullClient {
    fn with_tags(&self, _tags: &[(&str, &str)]) -> Box<dyn Client> {
        Box::new(*self)
    }

    fn with_rate(&self, _rate: f64) -> Box<dyn Client> {
        Box::new(*self)
    }

    fn count(&self, _name: &str, _value: i64) {}

    fn gauge(&self, _name: &str, _value: f64) {}

    fn event(&self, _event: Event) {}

    fn timing(&self, _name: &str, _value: Duration) {}

    fn histogram(&self, _name: &str, _value: f64) {}

    fn distribution(&self, _name: &str, _value: f64) {}

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}
