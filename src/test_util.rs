use parking_lot::Mutex;

use crate::logger::InfoLogger;
use crate::recorder::TestFailer;

/// Records failure messages instead of failing the test, so failures can be asserted on.
#[derive(Default)]
pub(crate) struct CollectFailer {
    messages: Mutex<Vec<String>>,
}

impl CollectFailer {
    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl TestFailer for CollectFailer {
    fn fatal(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

/// Collects the lines of a [`LoggerClient`](crate::LoggerClient).
#[derive(Default)]
pub(crate) struct LogCollector {
    lines: Mutex<Vec<String>>,
}

impl LogCollector {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl InfoLogger for LogCollector {
    fn print(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}
