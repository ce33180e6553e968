//! The processing engine seam.
//!
//! The echo cancellation, noise suppression, gain control and BGHVS
//! algorithms live in an external engine. This crate talks to it only
//! through [`AudioProcessingEngine`]; every method mirrors one engine entry
//! point and returns the engine's status unchanged.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{AecConfig, AgcConfig, AnsConfig, BghvsConfig};
use crate::error::EngineError;
use crate::events::EventSink;
use crate::frame::AudioFrame;
use crate::models::AiModelResourceConfig;

mod loopback;

pub use loopback::LoopbackEngine;

/// Result of an engine call. `Err` carries the engine's status verbatim.
pub type EngineResult<T = ()> = Result<T, EngineError>;

/// Credentials passed to [`AudioProcessingEngine::init`].
#[derive(derive_more::Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub app_id: String,
    #[debug(skip)]
    pub license: String,
}

/// Diagnostic data dump settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpOption {
    pub enabled: bool,
    /// Directory receiving dump files. It must exist and be writable.
    pub path: Option<PathBuf>,
}

impl DumpOption {
    pub fn enabled_at(path: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            path: Some(path.into()),
        }
    }
}

/// Runtime state reported by the engine.
///
/// All fields are `Option`: `None` means the engine did not report it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineState {
    /// Delay between input and processed output, in milliseconds.
    pub algorithm_latency_ms: Option<u32>,
    /// The same delay in samples at the queried sample rate.
    pub algorithm_latency_samples: Option<u32>,
    /// Estimated delay between the reference signal and its echo in the
    /// capture signal, in milliseconds.
    pub aec_estimated_delay_ms: Option<u32>,
}

/// An uplink 3A processing engine instance.
///
/// Status codes follow the engine convention: zero is success, anything
/// else is reported as [`EngineError`] and must be propagated unchanged.
pub trait AudioProcessingEngine: Send {
    /// Authenticates and prepares the engine. `events` stays shared with the
    /// engine until [`release`](Self::release).
    fn init(&mut self, credentials: &Credentials, events: Arc<dyn EventSink>) -> EngineResult;

    /// Tears the engine down and drops its reference to the event sink.
    fn release(&mut self);

    fn enable_data_dump(&mut self, option: &DumpOption) -> EngineResult;

    /// Dumps BGHVS intermediate data only, independent of the main dump.
    fn enable_bghvs_data_dump(&mut self, option: &DumpOption) -> EngineResult;

    fn set_aec_configuration(&mut self, config: &AecConfig) -> EngineResult;

    fn set_ans_configuration(&mut self, config: &AnsConfig) -> EngineResult;

    fn set_agc_configuration(&mut self, config: &AgcConfig) -> EngineResult;

    fn set_bghvs_configuration(&mut self, config: &BghvsConfig) -> EngineResult;

    /// Supplies one AI model. An empty config marks the model as absent.
    fn set_ai_model_resource(&mut self, resource: &AiModelResourceConfig) -> EngineResult;

    /// Delay between a far-end frame entering the reverse stream and its
    /// echo reaching the forward stream, in `60..=500` ms.
    fn set_stream_delay_ms(&mut self, delay_ms: i32) -> EngineResult;

    /// Current analog capture level in `0..=255`.
    fn set_stream_analog_level(&mut self, level: i32) -> EngineResult;

    /// Analog level suggested by AGC after the last forward frame.
    fn stream_analog_level(&self) -> EngineResult<i32>;

    /// Output gain in `0..=400`.
    fn set_gain(&mut self, gain: i32) -> EngineResult;

    /// Sets a private tuning parameter.
    fn set_parameter(&mut self, key: &str, value: i32) -> EngineResult;

    /// Processes one near-end (capture) frame in place.
    fn process_stream(&mut self, frame: &mut AudioFrame<'_>) -> EngineResult;

    /// Feeds one far-end (reference) frame.
    fn process_reverse_stream(&mut self, frame: &mut AudioFrame<'_>) -> EngineResult;

    /// Reports latency figures, with sample counts at `sample_rate_hz`.
    fn state(&self, sample_rate_hz: u32) -> EngineResult<EngineState>;

    /// Resets internal state after a reported malfunction.
    fn reset(&mut self) -> EngineResult;

    /// Version of the engine library. Available before `init`.
    fn sdk_version(&self) -> &'static str;
}
