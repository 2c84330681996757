// Guarded output stream shared by all workers.
//
// The only way to write is `write_line`, which holds the mutex across one
// full line, so lines from different workers never interleave. Order
// across lines is whatever the workers produce; callers that need input
// order must run single-threaded.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Cloneable handle to a mutex-guarded writer.
#[derive(Clone)]
pub struct SharedWriter {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl SharedWriter {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        SharedWriter {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Write one line plus its newline atomically.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut guard = self.inner.lock().expect("output stream poisoned");
        guard.write_all(line.as_bytes())?;
        guard.write_all(b"\n")
    }

    pub fn flush(&self) -> io::Result<()> {
        self.inner.lock().expect("output stream poisoned").flush()
    }
}
