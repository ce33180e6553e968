//! Engine notifications.
//!
//! The engine reports runtime events and errors through an [`EventSink`]
//! injected when a processor is created. Notifications are delivered
//! synchronously on whichever thread the engine uses; sinks that need to do
//! slow work must hand it off themselves.

use std::fmt;

/// Runtime event reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineEvent {
    /// Echo cancellation broke down. Recover by calling
    /// [`Processor::reset`](crate::Processor::reset) from another thread.
    AecMalfunction,
    /// An event code this crate does not know about.
    Other(i32),
}

impl EngineEvent {
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::AecMalfunction,
            other => Self::Other(other),
        }
    }

    pub const fn code(self) -> i32 {
        match self {
            Self::AecMalfunction => 0,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AecMalfunction => f.write_str("aec malfunction"),
            Self::Other(code) => write!(f, "event {code}"),
        }
    }
}

/// Receiver for engine notifications.
///
/// Implementations must not call back into the processor that raised the
/// notification.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: EngineEvent);

    fn on_error(&self, code: i32);
}

/// Sink that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSink;

impl EventSink for SilentSink {
    fn on_event(&self, _event: EngineEvent) {}

    fn on_error(&self, _code: i32) {}
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn on_event(&self, event: EngineEvent) {
        tracing::info!(%event, "engine event");
    }

    fn on_error(&self, code: i32) {
        tracing::warn!(code, "engine error");
    }
}
