//! Diagnostics hooks for the parse engine.

use super::engine::StopReason;

/// Counters gathered while tokenizing one document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Bytes handed to the tokenizer.
    pub bytes: usize,
    /// Start tags seen, including empty elements.
    pub elements: usize,
    /// Character-data events delivered to the engine.
    pub text_events: usize,
}

/// Receives diagnostics from a parse. Every method defaults to doing nothing,
/// and nothing an observer does can change the parse result.
pub trait ParseObserver: Send + Sync {
    /// Recoverable markup or decoding irregularity.
    fn on_warning(&self, _message: &str) {}

    /// Failure that ends a parse or a cover decode.
    fn on_error(&self, _message: &str) {}

    /// The engine stopped early because it had everything it needed.
    fn on_stop(&self, _reason: StopReason) {}

    fn on_finished(&self, _stats: &ParseStats) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ParseObserver for NullObserver {}

/// Forwards diagnostics to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl ParseObserver for LogObserver {
    fn on_warning(&self, message: &str) {
        log::warn!("{message}");
    }

    fn on_error(&self, message: &str) {
        log::error!("{message}");
    }

    fn on_stop(&self, reason: StopReason) {
        log::debug!("parse stopped early: {reason}");
    }

    fn on_finished(&self, stats: &ParseStats) {
        log::debug!(
            "parsed {} bytes: {} elements, {} text events",
            stats.bytes,
            stats.elements,
            stats.text_events
        );
    }
}
