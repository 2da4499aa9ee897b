//! Activation end markers.
//!
//! An external log collector scans the process's stdout and stderr for
//! [`ACTIVATION_END_MARKER`] to split the log streams into activations. Both
//! streams get the marker, each flushed, before the response is returned.
//!
//! A `/run` holds an [`ActivationMarker`] for its whole lifetime, so the
//! marker is written exactly once even if the request is abandoned while
//! the entry point is still running.

use std::io::{self, Write};
use std::sync::Arc;

use tracing::warn;

pub use action_runtime_common::ACTIVATION_END_MARKER;

/// Destination of activation end markers.
pub trait MarkerSink: Send + Sync {
    /// Mark the end of the current activation's logs.
    fn write_end_marker(&self);
}

/// Writes markers to the process's stdout and stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioMarkers;

impl MarkerSink for StdioMarkers {
    fn write_end_marker(&self) {
        write_to_both(&mut io::stdout().lock(), &mut io::stderr().lock());
    }
}

/// Write the marker to the stdout and stderr stand-ins, in that order.
///
/// A failure on one stream is logged and does not keep the other from
/// getting its marker.
pub fn write_to_both(stdout: &mut impl Write, stderr: &mut impl Write) {
    if let Err(e) = write_marker(stdout) {
        warn!(error = %e, "Failed to write activation marker to stdout");
    }
    if let Err(e) = write_marker(stderr) {
        warn!(error = %e, "Failed to write activation marker to stderr");
    }
}

/// Write one marker line to `out` and flush it.
pub fn write_marker(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{ACTIVATION_END_MARKER}")?;
    out.flush()
}

/// Writes one end marker when dropped.
#[must_use = "the marker is written when the guard is dropped"]
pub struct ActivationMarker {
    sink: Arc<dyn MarkerSink>,
}

impl ActivationMarker {
    /// Arm a marker for the activation that starts now.
    pub fn new(sink: Arc<dyn MarkerSink>) -> Self {
        Self { sink }
    }
}

impl Drop for ActivationMarker {
    fn drop(&mut self) {
        self.sink.write_end_marker();
    }
}

impl std::fmt::Debug for ActivationMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationMarker").finish_non_exhaustive()
    }
}

/// Counts markers instead of writing them.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct CountingMarkers {
    count: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl CountingMarkers {
    pub fn count(&self) -> usize {
        self.count.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl MarkerSink for CountingMarkers {
    fn write_end_marker(&self) {
        self.count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}
