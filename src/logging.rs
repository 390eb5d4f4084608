//! Logging setup for the binary
//!
//! Installs a global tracing subscriber that writes to stderr through the
//! live display, so a log line never lands in the middle of a bar redraw.

use std::io::Write;
use std::sync::Arc;

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::display::ProgressDisplay;
use crate::error::{Error, Result};

/// Filter used when `RUST_LOG` is unset
pub fn default_directive(debug: bool) -> &'static str {
    if debug { "warn,auntie=debug" } else { "warn" }
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over `debug`. Fails if a subscriber is
/// already installed.
pub fn init(display: Arc<ProgressDisplay>, debug: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(DisplayWriter::new(display)),
        )
        .try_init()
        .map_err(|e| Error::Other(format!("failed to install tracing subscriber: {e}")))?;

    tracing::debug!("debug logging enabled");
    Ok(())
}

/// [`MakeWriter`] that hides the live bars while a record is written
#[derive(Clone)]
pub struct DisplayWriter {
    display: Arc<ProgressDisplay>,
}

impl DisplayWriter {
    /// Writer for records shown alongside `display`
    pub fn new(display: Arc<ProgressDisplay>) -> Self {
        Self { display }
    }
}

impl<'a> MakeWriter<'a> for DisplayWriter {
    type Writer = SuspendedStderr;

    fn make_writer(&'a self) -> Self::Writer {
        SuspendedStderr {
            display: Arc::clone(&self.display),
            buffer: Vec::new(),
        }
    }
}

/// Buffers one record and writes it to stderr on drop
pub struct SuspendedStderr {
    display: Arc<ProgressDisplay>,
    buffer: Vec<u8>,
}

impl Write for SuspendedStderr {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for SuspendedStderr {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let buffer = std::mem::take(&mut self.buffer);
        self.display.suspend(|| {
            let mut stderr = std::io::stderr().lock();
            let _ = stderr.write_all(&buffer);
            let _ = stderr.flush();
        });
    }
}
