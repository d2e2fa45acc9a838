//! Output routing for `puts`, `print` and `warn`.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Destination for Kernel output methods.
pub trait OutputSink {
    fn write_out(&mut self, text: &str);
    fn write_err(&mut self, text: &str);
}

/// Writes to the process's stdout and stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdSink;

impl OutputSink for StdSink {
    fn write_out(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        if out.write_all(text.as_bytes()).and_then(|()| out.flush()).is_err() {
            oxirb_log::debug!("stdout write failed");
        }
    }

    fn write_err(&mut self, text: &str) {
        if std::io::stderr().lock().write_all(text.as_bytes()).is_err() {
            oxirb_log::debug!("stderr write failed");
        }
    }
}

/// Collects output in memory. Clones share the same buffers, so a test can
/// hand one clone to the runtime and read through another.
#[derive(Debug, Default, Clone)]
pub struct CaptureSink {
    out: Rc<RefCell<String>>,
    err: Rc<RefCell<String>>,
}

impl CaptureSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written to stdout so far.
    #[must_use]
    pub fn stdout(&self) -> String {
        self.out.borrow().clone()
    }

    /// Everything written to stderr so far.
    #[must_use]
    pub fn stderr(&self) -> String {
        self.err.borrow().clone()
    }

    pub fn clear(&self) {
        self.out.borrow_mut().clear();
        self.err.borrow_mut().clear();
    }
}

impl OutputSink for CaptureSink {
    fn write_out(&mut self, text: &str) {
        self.out.borrow_mut().push_str(text);
    }

    fn write_err(&mut self, text: &str) {
        self.err.borrow_mut().push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_sink_shares_buffers() {
        let sink = CaptureSink::new();
        let mut handle: Box<dyn OutputSink> = Box::new(sink.clone());
        handle.write_out("a\n");
        handle.write_err("b");
        assert_eq!(sink.stdout(), "a\n");
        assert_eq!(sink.stderr(), "b");

        sink.clear();
        assert!(sink.stdout().is_empty());
    }
}
