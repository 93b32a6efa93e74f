//! Cross-plugin broadcast bus.
//!
//! Plugins never hold references to each other. A plugin that wants to
//! tell the others something posts a [`BusMessage`]; the engine drains
//! the queue after the current dispatch step and hands the message to
//! every plugin except the sender.

use serde_json::Value;

/// One broadcast in flight.
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// Index of the posting plugin; excluded from delivery.
    pub from: usize,
    /// Free-form topic string, e.g. `"seen.update"`.
    pub header: String,
    /// Structured payload.
    pub payload: Value,
}
