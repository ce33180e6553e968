//! Delivery of engine notifications to C callbacks.

use std::ffi::c_void;

use crate::events::{EngineEvent, EventSink};

use super::types::ApProcessorEventHandler;

/// Forwards notifications to the C callbacks of one processor.
///
/// Callbacks run synchronously on the engine's thread. A null callback
/// drops the notification.
#[derive(Debug)]
pub(crate) struct CallbackSink {
    handler: ApProcessorEventHandler,
    user_data: *mut c_void,
}

// Safety: `user_data` is an opaque token owned by the C caller; this type
// never dereferences it. The caller guarantees its callbacks may be invoked
// from the thread driving the processor.
unsafe impl Send for CallbackSink {}
unsafe impl Sync for CallbackSink {}

impl CallbackSink {
    pub(crate) fn new(handler: ApProcessorEventHandler, user_data: *mut c_void) -> Self {
        Self { handler, user_data }
    }
}

impl EventSink for CallbackSink {
    fn on_event(&self, event: EngineEvent) {
        tracing::debug!(%event, "engine event");
        if let Some(callback) = self.handler.on_event {
            // Safety: the caller registered this callback together with
            // `user_data`; `extern "C"` functions cannot unwind into us.
            unsafe { callback(self.user_data, event.code()) };
        }
    }

    fn on_error(&self, code: i32) {
        tracing::warn!(code, "engine error");
        if let Some(callback) = self.handler.on_error {
            // Safety: see `on_event`.
            unsafe { callback(self.user_data, code) };
        }
    }
}
