//! Ambient output stream.
//!
//! Everything a running script prints goes through one [`OutputStream`].
//! It has a process-wide destination that can be swapped (the BLE REPL
//! points it at the notify channel between `START` and `STOP`), and a
//! per-thread scoped redirection used by the cell engine so that a cell's
//! prints reach the connection that ran it.
//!
//! ```text
//! script print ──▶ OutputStream::write
//!                     │
//!                     ├── thread has a Redirect? ──▶ capture sink (cell run)
//!                     │
//!                     └── otherwise ──────────────▶ process-wide sink
//! ```

use std::cell::RefCell;
use std::io::Write;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Destination for printed text.
pub trait OutputSink: Send {
    /// Write one piece of printed text.
    fn write(&mut self, text: &str);
}

/// Writes to the process stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write(&mut self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

/// Adapts a closure into an [`OutputSink`].
pub struct FnSink<F>(pub F);

impl<F: FnMut(&str) + Send> OutputSink for FnSink<F> {
    fn write(&mut self, text: &str) {
        (self.0)(text)
    }
}

thread_local! {
    static CAPTURE: RefCell<Option<Box<dyn OutputSink>>> = const { RefCell::new(None) };
}

/// Switchable destination for script output.
#[derive(Clone)]
pub struct OutputStream {
    sink: Arc<Mutex<Box<dyn OutputSink>>>,
}

impl OutputStream {
    /// Create a stream with `sink` as its process-wide destination.
    pub fn new(sink: impl OutputSink + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    /// Create a stream that prints to stdout.
    pub fn stdout() -> Self {
        Self::new(StdoutSink)
    }

    /// Write text to the current destination.
    pub fn write(&self, text: &str) {
        let captured = CAPTURE.with(|slot| match slot.try_borrow_mut() {
            Ok(mut slot) => match slot.as_mut() {
                Some(sink) => {
                    sink.write(text);
                    true
                }
                None => false,
            },
            // A capture sink that prints re-enters here; send it to the default.
            Err(_) => false,
        });
        if !captured {
            self.lock().write(text);
        }
    }

    /// Swap the process-wide destination, returning the previous one.
    pub fn replace(&self, sink: Box<dyn OutputSink>) -> Box<dyn OutputSink> {
        std::mem::replace(&mut *self.lock(), sink)
    }

    /// Redirect this thread's output to `sink` until the guard drops.
    ///
    /// Redirections nest; dropping a guard reinstates whatever was active
    /// when it was created, on every exit path including unwinding.
    pub fn redirect(&self, sink: Box<dyn OutputSink>) -> Redirect {
        let previous = CAPTURE.with(|slot| slot.borrow_mut().replace(sink));
        Redirect {
            previous,
            _thread_bound: PhantomData,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn OutputSink>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for OutputStream {
    fn default() -> Self {
        Self::stdout()
    }
}

/// Guard for a scoped redirection; restores the previous capture on drop.
#[must_use = "output is restored as soon as the guard is dropped"]
pub struct Redirect {
    previous: Option<Box<dyn OutputSink>>,
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for Redirect {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CAPTURE.with(|slot| *slot.borrow_mut() = previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<String>>, FnSink<impl FnMut(&str) + Send>) {
        let buf = Arc::new(Mutex::new(String::new()));
        let target = buf.clone();
        (buf, FnSink(move |s: &str| target.lock().unwrap().push_str(s)))
    }

    #[test]
    fn test_write_goes_to_default() {
        let (buf, sink) = recorder();
        let stream = OutputStream::new(sink);
        stream.write("hello");
        assert_eq!(*buf.lock().unwrap(), "hello");
    }

    #[test]
    fn test_redirect_is_scoped() {
        let (default, sink) = recorder();
        let (captured, capture) = recorder();
        let stream = OutputStream::new(sink);
        {
            let _guard = stream.redirect(Box::new(capture));
            stream.write("inside");
        }
        stream.write("after");
        assert_eq!(*captured.lock().unwrap(), "inside");
        assert_eq!(*default.lock().unwrap(), "after");
    }

    #[test]
    fn test_redirect_restored_on_panic() {
        let (default, sink) = recorder();
        let (_captured, capture) = recorder();
        let stream = OutputStream::new(sink);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = stream.redirect(Box::new(capture));
            panic!("cell blew up");
        }));
        assert!(result.is_err());
        stream.write("later");
        assert_eq!(*default.lock().unwrap(), "later");
    }

    #[test]
    fn test_nested_redirects() {
        let (_default, sink) = recorder();
        let (outer, outer_sink) = recorder();
        let (inner, inner_sink) = recorder();
        let stream = OutputStream::new(sink);

        let _outer = stream.redirect(Box::new(outer_sink));
        {
            let _inner = stream.redirect(Box::new(inner_sink));
            stream.write("a");
        }
        stream.write("b");
        assert_eq!(*inner.lock().unwrap(), "a");
        assert_eq!(*outer.lock().unwrap(), "b");
    }

    #[test]
    fn test_redirect_is_per_thread() {
        let (default, sink) = recorder();
        let (captured, capture) = recorder();
        let stream = OutputStream::new(sink);
        let _guard = stream.redirect(Box::new(capture));

        let other = stream.clone();
        std::thread::spawn(move || other.write("elsewhere"))
            .join()
            .unwrap();

        assert_eq!(*default.lock().unwrap(), "elsewhere");
        assert!(captured.lock().unwrap().is_empty());
    }

    #[test]
    fn test_replace_returns_previous() {
        let (first, first_sink) = recorder();
        let (second, second_sink) = recorder();
        let stream = OutputStream::new(first_sink);

        let previous = stream.replace(Box::new(second_sink));
        stream.write("x");
        stream.replace(previous);
        stream.write("y");

        assert_eq!(*second.lock().unwrap(), "x");
        assert_eq!(*first.lock().unwrap(), "y");
    }
}
