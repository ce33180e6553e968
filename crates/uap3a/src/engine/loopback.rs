//! In-tree engine that performs no signal processing.
//!
//! Validates parameters against the ranges documented for the vendor
//! engine, keeps the applied configuration, and leaves audio untouched.
//! Useful for exercising the C API and the harness without the proprietary
//! library.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::config::{
    AecConfig, AecFilterLength, AecModelType, AecSuppressionMode, AgcConfig, AiAecSuppressionMode,
    AnsConfig, AnsModelType, AnsSuppressionMode, BghvsConfig, BghvsSuppressionMode,
    MAX_STARTUP_SUPPRESS_TIME_MS,
};
use crate::error::EngineError;
use crate::events::EventSink;
use crate::frame::AudioFrame;
use crate::models::{AiModelResourceConfig, ModelKind};

use super::{AudioProcessingEngine, Credentials, DumpOption, EngineResult, EngineState};

/// Engine that passes audio through unchanged.
#[derive(derive_more::Debug, Default)]
pub struct LoopbackEngine {
    initialized: bool,
    #[debug(skip)]
    events: Option<Arc<dyn EventSink>>,
    dump: DumpOption,
    bghvs_dump: DumpOption,
    aec: AecConfig,
    ans: AnsConfig,
    agc: AgcConfig,
    bghvs: BghvsConfig,
    models: Vec<&'static str>,
    stream_delay_ms: i32,
    analog_level: i32,
    gain: i32,
    parameters: BTreeMap<String, i32>,
    forward_frames: u64,
    reverse_frames: u64,
}

impl LoopbackEngine {
    /// `init` was rejected.
    pub const ERR_INVALID_CREDENTIALS: i32 = -1001;
    /// A call was made before a successful `init`.
    pub const ERR_NOT_INITIALIZED: i32 = -1002;
    /// A value is outside its documented range.
    pub const ERR_INVALID_PARAMETER: i32 = -1003;

    pub const SDK_VERSION: &'static str = concat!("loopback-", env!("CARGO_PKG_VERSION"));

    pub fn new() -> Self {
        Self {
            gain: 100,
            ..Self::default()
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Names of the models supplied so far, in order.
    pub fn models(&self) -> &[&'static str] {
        &self.models
    }

    pub fn dump_option(&self) -> &DumpOption {
        &self.dump
    }

    pub fn bghvs_dump_option(&self) -> &DumpOption {
        &self.bghvs_dump
    }

    pub fn aec_config(&self) -> &AecConfig {
        &self.aec
    }

    pub fn ans_config(&self) -> &AnsConfig {
        &self.ans
    }

    pub fn agc_config(&self) -> &AgcConfig {
        &self.agc
    }

    pub fn bghvs_config(&self) -> &BghvsConfig {
        &self.bghvs
    }

    pub fn forward_frames(&self) -> u64 {
        self.forward_frames
    }

    pub fn reverse_frames(&self) -> u64 {
        self.reverse_frames
    }

    pub fn parameter(&self, key: &str) -> Option<i32> {
        self.parameters.get(key).copied()
    }

    fn ensure_initialized(&self) -> EngineResult {
        if self.initialized {
            Ok(())
        } else {
            Err(EngineError::new(Self::ERR_NOT_INITIALIZED))
        }
    }

    fn check_range(value: Option<i32>, range: RangeInclusive<i32>) -> EngineResult {
        match value {
            Some(v) if !range.contains(&v) => Err(EngineError::new(Self::ERR_INVALID_PARAMETER)),
            _ => Ok(()),
        }
    }

    /// Unknown enum values are forwarded by the mapper and refused here.
    fn check_known(known: Option<bool>) -> EngineResult {
        match known {
            Some(false) => Err(EngineError::new(Self::ERR_INVALID_PARAMETER)),
            _ => Ok(()),
        }
    }

    fn check_dump(option: &DumpOption) -> EngineResult {
        if option.enabled && option.path.is_none() {
            return Err(EngineError::new(Self::ERR_INVALID_PARAMETER));
        }
        Ok(())
    }

    fn fail(&self, code: i32) -> EngineResult {
        if let Some(events) = &self.events {
            events.on_error(code);
        }
        Err(EngineError::new(code))
    }
}

impl AudioProcessingEngine for LoopbackEngine {
    fn init(&mut self, credentials: &Credentials, events: Arc<dyn EventSink>) -> EngineResult {
        self.events = Some(events);
        if credentials.app_id.is_empty() {
            return self.fail(Self::ERR_INVALID_CREDENTIALS);
        }
        self.initialized = true;
        tracing::debug!(app_id = %credentials.app_id, "loopback engine initialized");
        Ok(())
    }

    fn release(&mut self) {
        self.initialized = false;
        self.events = None;
    }

    fn enable_data_dump(&mut self, option: &DumpOption) -> EngineResult {
        Self::check_dump(option)?;
        self.dump = option.clone();
        Ok(())
    }

    fn enable_bghvs_data_dump(&mut self, option: &DumpOption) -> EngineResult {
        Self::check_dump(option)?;
        self.bghvs_dump = option.clone();
        Ok(())
    }

    fn set_aec_configuration(&mut self, config: &AecConfig) -> EngineResult {
        Self::check_known(config.filter_length.map(AecFilterLength::is_known))?;
        Self::check_known(config.aec_model_type.map(AecModelType::is_known))?;
        Self::check_known(config.aec_suppression_mode.map(AecSuppressionMode::is_known))?;
        Self::check_known(
            config
                .ai_aec_suppression_mode
                .map(AiAecSuppressionMode::is_known),
        )?;
        Self::check_range(
            config.aec_startup_max_suppress_time_ms,
            0..=MAX_STARTUP_SUPPRESS_TIME_MS,
        )?;
        self.aec = *config;
        Ok(())
    }

    fn set_ans_configuration(&mut self, config: &AnsConfig) -> EngineResult {
        Self::check_known(config.suppression_mode.map(AnsSuppressionMode::is_known))?;
        Self::check_known(config.ans_model_type.map(AnsModelType::is_known))?;
        Self::check_range(config.speech_protect_threshold, 0..=100)?;
        self.ans = *config;
        Ok(())
    }

    fn set_agc_configuration(&mut self, config: &AgcConfig) -> EngineResult {
        self.agc = *config;
        Ok(())
    }

    fn set_bghvs_configuration(&mut self, config: &BghvsConfig) -> EngineResult {
        Self::check_known(config.suppression_mode.map(BghvsSuppressionMode::is_known))?;
        Self::check_range(config.sos_len_ms, 0..=i32::MAX)?;
        Self::check_range(config.eos_len_ms, 0..=i32::MAX)?;
        Self::check_range(config.delay_frames, 0..=i32::MAX)?;
        self.bghvs = *config;
        Ok(())
    }

    fn set_ai_model_resource(&mut self, resource: &AiModelResourceConfig) -> EngineResult {
        if resource.is_empty() {
            return Ok(());
        }
        let name = resource
            .model_name
            .filter(|name| ModelKind::ALL.iter().any(|kind| kind.name() == *name))
            .ok_or(EngineError::new(Self::ERR_INVALID_PARAMETER))?;
        let data_len = resource.model_data.as_ref().map(|data| data.len());
        if data_len != resource.model_data_size {
            return Err(EngineError::new(Self::ERR_INVALID_PARAMETER));
        }
        self.models.push(name);
        Ok(())
    }

    fn set_stream_delay_ms(&mut self, delay_ms: i32) -> EngineResult {
        Self::check_range(Some(delay_ms), 60..=500)?;
        self.stream_delay_ms = delay_ms;
        Ok(())
    }

    fn set_stream_analog_level(&mut self, level: i32) -> EngineResult {
        Self::check_range(Some(level), 0..=255)?;
        self.analog_level = level;
        Ok(())
    }

    fn stream_analog_level(&self) -> EngineResult<i32> {
        self.ensure_initialized()?;
        Ok(self.analog_level)
    }

    fn set_gain(&mut self, gain: i32) -> EngineResult {
        Self::check_range(Some(gain), 0..=400)?;
        self.gain = gain;
        Ok(())
    }

    fn set_parameter(&mut self, key: &str, value: i32) -> EngineResult {
        if key.is_empty() {
            return Err(EngineError::new(Self::ERR_INVALID_PARAMETER));
        }
        self.parameters.insert(key.to_owned(), value);
        Ok(())
    }

    fn process_stream(&mut self, frame: &mut AudioFrame<'_>) -> EngineResult {
        self.ensure_initialized()?;
        self.forward_frames += 1;
        tracing::trace!(samples = frame.samples().len(), "loopback forward frame");
        Ok(())
    }

    fn process_reverse_stream(&mut self, _frame: &mut AudioFrame<'_>) -> EngineResult {
        self.ensure_initialized()?;
        self.reverse_frames += 1;
        Ok(())
    }

    fn state(&self, _sample_rate_hz: u32) -> EngineResult<EngineState> {
        self.ensure_initialized()?;
        let aec_estimated_delay_ms = if self.aec.enabled == Some(true) {
            u32::try_from(self.stream_delay_ms).ok()
        } else {
            None
        };
        Ok(EngineState {
            algorithm_latency_ms: Some(0),
            algorithm_latency_samples: Some(0),
            aec_estimated_delay_ms,
        })
    }

    fn reset(&mut self) -> EngineResult {
        self.ensure_initialized()?;
        tracing::debug!(
            forward_frames = self.forward_frames,
            reverse_frames = self.reverse_frames,
            "loopback engine reset"
        );
        self.forward_frames = 0;
        self.reverse_frames = 0;
        Ok(())
    }

    fn sdk_version(&self) -> &'static str {
        Self::SDK_VERSION
    }
}
