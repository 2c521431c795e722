//! Concrete sinks that touch the outside world.

use std::io::Write;

use spirida_core::Sink;

/// Writes each line to stdout. Write errors are logged and dropped; emitted
/// text is best-effort.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn emit(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{line}") {
            tracing::debug!("stdout sink write failed: {e}");
        }
    }
}

/// Routes lines into the tracing pipeline at `info` under the
/// `spirida::sink` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn emit(&self, line: &str) {
        tracing::info!(target: "spirida::sink", "{line}");
    }
}
