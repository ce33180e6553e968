//! Test doubles for engine-facing code.
//!
//! [`RecordingEngine`] appends every call it receives to a shared
//! [`CallLog`] and answers with configurable statuses, which is enough to
//! assert call ordering and status propagation without a real engine.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::{AecConfig, AgcConfig, AnsConfig, BghvsConfig};
use crate::engine::{AudioProcessingEngine, Credentials, DumpOption, EngineResult, EngineState};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventSink};
use crate::frame::AudioFrame;
use crate::models::AiModelResourceConfig;

/// One engine call as seen by [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Init { app_id: String },
    Release,
    EnableDataDump(DumpOption),
    EnableBghvsDataDump(DumpOption),
    SetAec(AecConfig),
    SetAns(AnsConfig),
    SetAgc(AgcConfig),
    SetBghvs(BghvsConfig),
    SetAiModelResource {
        name: Option<&'static str>,
        size: Option<usize>,
    },
    SetStreamDelayMs(i32),
    SetStreamAnalogLevel(i32),
    SetGain(i32),
    SetParameter(String, i32),
    ProcessReverseStream { samples: Vec<i16> },
    ProcessStream { samples: Vec<i16> },
    State(u32),
    Reset,
}

/// Shared, ordered record of engine calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Call>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, call: Call) {
        self.lock().push(call);
    }

    /// Snapshot of every call so far.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Statuses returned by [`RecordingEngine`]. Zero means success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statuses {
    pub init: i32,
    pub config: i32,
    pub model: i32,
    pub process_reverse_stream: i32,
    pub process_stream: i32,
    /// Event raised through the sink on every forward frame.
    pub event_on_process: Option<EngineEvent>,
}

/// Engine double that records calls and returns canned statuses.
#[derive(derive_more::Debug)]
pub struct RecordingEngine {
    log: CallLog,
    statuses: Statuses,
    analog_level: i32,
    #[debug(skip)]
    events: Option<Arc<dyn EventSink>>,
}

impl RecordingEngine {
    pub const SDK_VERSION: &'static str = "recording";

    pub fn new(log: CallLog) -> Self {
        Self::with_statuses(log, Statuses::default())
    }

    pub fn with_statuses(log: CallLog, statuses: Statuses) -> Self {
        Self {
            log,
            statuses,
            analog_level: 0,
            events: None,
        }
    }
}

impl AudioProcessingEngine for RecordingEngine {
    fn init(&mut self, credentials: &Credentials, events: Arc<dyn EventSink>) -> EngineResult {
        self.log.push(Call::Init {
            app_id: credentials.app_id.clone(),
        });
        if self.statuses.init != 0 {
            events.on_error(self.statuses.init);
        }
        self.events = Some(events);
        EngineError::check(self.statuses.init)
    }

    fn release(&mut self) {
        self.log.push(Call::Release);
        self.events = None;
    }

    fn enable_data_dump(&mut self, option: &DumpOption) -> EngineResult {
        self.log.push(Call::EnableDataDump(option.clone()));
        Ok(())
    }

    fn enable_bghvs_data_dump(&mut self, option: &DumpOption) -> EngineResult {
        self.log.push(Call::EnableBghvsDataDump(option.clone()));
        Ok(())
    }

    fn set_aec_configuration(&mut self, config: &AecConfig) -> EngineResult {
        self.log.push(Call::SetAec(*config));
        EngineError::check(self.statuses.config)
    }

    fn set_ans_configuration(&mut self, config: &AnsConfig) -> EngineResult {
        self.log.push(Call::SetAns(*config));
        EngineError::check(self.statuses.config)
    }

    fn set_agc_configuration(&mut self, config: &AgcConfig) -> EngineResult {
        self.log.push(Call::SetAgc(*config));
        EngineError::check(self.statuses.config)
    }

    fn set_bghvs_configuration(&mut self, config: &BghvsConfig) -> EngineResult {
        self.log.push(Call::SetBghvs(*config));
        EngineError::check(self.statuses.config)
    }

    fn set_ai_model_resource(&mut self, resource: &AiModelResourceConfig) -> EngineResult {
        self.log.push(Call::SetAiModelResource {
            name: resource.model_name,
            size: resource.model_data_size,
        });
        EngineError::check(self.statuses.model)
    }

    fn set_stream_delay_ms(&mut self, delay_ms: i32) -> EngineResult {
        self.log.push(Call::SetStreamDelayMs(delay_ms));
        Ok(())
    }

    fn set_stream_analog_level(&mut self, level: i32) -> EngineResult {
        self.log.push(Call::SetStreamAnalogLevel(level));
        self.analog_level = level;
        Ok(())
    }

    fn stream_analog_level(&self) -> EngineResult<i32> {
        Ok(self.analog_level)
    }

    fn set_gain(&mut self, gain: i32) -> EngineResult {
        self.log.push(Call::SetGain(gain));
        Ok(())
    }

    fn set_parameter(&mut self, key: &str, value: i32) -> EngineResult {
        self.log.push(Call::SetParameter(key.to_owned(), value));
        Ok(())
    }

    fn process_stream(&mut self, frame: &mut AudioFrame<'_>) -> EngineResult {
        self.log.push(Call::ProcessStream {
            samples: frame.samples().to_vec(),
        });
        if let (Some(event), Some(events)) = (self.statuses.event_on_process, &self.events) {
            events.on_event(event);
        }
        EngineError::check(self.statuses.process_stream)
    }

    fn process_reverse_stream(&mut self, frame: &mut AudioFrame<'_>) -> EngineResult {
        self.log.push(Call::ProcessReverseStream {
            samples: frame.samples().to_vec(),
        });
        EngineError::check(self.statuses.process_reverse_stream)
    }

    fn state(&self, sample_rate_hz: u32) -> EngineResult<EngineState> {
        self.log.push(Call::State(sample_rate_hz));
        Ok(EngineState {
            algorithm_latency_ms: Some(10),
            algorithm_latency_samples: Some(sample_rate_hz / 100),
            aec_estimated_delay_ms: None,
        })
    }

    fn reset(&mut self) -> EngineResult {
        self.log.push(Call::Reset);
        Ok(())
    }

    fn sdk_version(&self) -> &'static str {
        RecordingEngine::SDK_VERSION
    }
}

/// A notification received by [`RecordingSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Event(EngineEvent),
    Error(i32),
}

/// Event sink that keeps every notification.
#[derive(Debug, Default)]
pub struct RecordingSink(Mutex<Vec<Notification>>);

impl RecordingSink {
    pub fn notifications(&self) -> Vec<Notification> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn push(&self, notification: Notification) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

impl EventSink for RecordingSink {
    fn on_event(&self, event: EngineEvent) {
        self.push(Notification::Event(event));
    }

    fn on_error(&self, code: i32) {
        self.push(Notification::Error(code));
    }
}
