//! `#[repr(C)]` types of the C API.
//!
//! Field order and widths are part of the ABI. Booleans are C99 `_Bool`,
//! enums travel as plain `int`.

use std::ffi::{c_char, c_int, c_void};

use crate::Processor;
use crate::Service;

/// Settings for `agora_ap_service_initialize`.
///
/// The strings are copied during the call; the caller keeps ownership.
/// A null string reads as empty.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ApServiceConfig {
    pub app_id: *const c_char,
    pub license: *const c_char,
    /// Directory holding the model files, e.g. `/user/xx/resource/`.
    pub resource_path: *const c_char,
}

/// Notification callback. `user_data` is the token bound to the processor.
pub type ApEventCallback = Option<unsafe extern "C" fn(user_data: *mut c_void, code: c_int)>;

/// Callbacks receiving engine notifications. Either may be null.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ApProcessorEventHandler {
    /// Receives event codes; `0` is an AEC malfunction.
    pub on_event: ApEventCallback,
    /// Receives engine error codes.
    pub on_error: ApEventCallback,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApAecConfig {
    pub enabled: bool,
    pub stereo_aec_enabled: bool,
    pub enable_aec_auto_reset: bool,
    pub aec_startup_max_suppress_time_ms: c_int,
    pub filter_length: c_int,
    pub aec_model_type: c_int,
    pub ai_aec_suppression_mode: c_int,
    pub aec_suppression_mode: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApAnsConfig {
    pub enabled: bool,
    pub suppression_mode: c_int,
    pub ans_model_type: c_int,
    /// `0..=100`; 100 (default) disables speech protection.
    pub speech_protect_threshold: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApAgcConfig {
    pub enabled: bool,
    pub use_analog_mode: bool,
    pub max_digital_gain_db: c_int,
    pub target_level_db: c_int,
    pub curve_slope: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApBghvsConfig {
    pub enabled: bool,
    pub sos_len_ms: c_int,
    pub eos_len_ms: c_int,
    pub suppression_mode: c_int,
    /// In 10 ms frames.
    pub delay_frames: c_int,
}

/// Flat processor configuration.
///
/// Obtain the recommended baseline via `agora_ap_processor_config_create()`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApProcessorConfig {
    pub aec_config: ApAecConfig,
    pub ans_config: ApAnsConfig,
    pub agc_config: ApAgcConfig,
    pub bghvs_config: ApBghvsConfig,
    /// `0`: forward the caller's reference frame (required).
    /// `1`: feed silence while AEC is disabled or no reference is given.
    pub reference_mode: c_int,
}

/// One 10 ms frame of interleaved PCM16 audio.
///
/// Layout version 1, see `agora_ap_frame_layout_version()`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ApAudioFrame {
    /// `0`: PCM16.
    pub frame_type: c_int,
    /// One of 8000, 16000, 24000, 32000, 44100, 48000.
    pub sample_rate: c_int,
    /// 1 or 2.
    pub channels: c_int,
    /// Must equal `sample_rate / 100`.
    pub samples_per_channel: c_int,
    /// Must be 2.
    pub bytes_per_sample: c_int,
    /// `channels * samples_per_channel` samples, interleaved.
    pub buffer: *mut c_void,
}

/// Runtime state filled by `agora_ap_processor_get_state`.
///
/// Each value is meaningful only when its `has_*` flag is set.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApProcessorState {
    pub has_algorithm_latency_ms: bool,
    pub algorithm_latency_ms: u32,
    pub has_algorithm_latency_samples: bool,
    pub algorithm_latency_samples: u32,
    pub has_aec_estimated_delay_ms: bool,
    pub aec_estimated_delay_ms: u32,
}

/// Opaque process-wide service handle.
///
/// The pointer C holds is a registry token, never the address of this
/// value. Created by `agora_ap_service_create()`, destroyed by
/// `agora_ap_service_release()`.
#[derive(Debug, Default)]
pub struct ApService {
    pub(crate) service: Option<Service>,
    pub(crate) event_handler: ApProcessorEventHandler,
}

impl ApService {
    pub(crate) fn is_initialized(&self) -> bool {
        self.service.is_some()
    }
}

/// Opaque processor handle.
///
/// The pointer C holds is a registry token, never the address of this
/// value. Created by `agora_ap_processor_create()`, destroyed by
/// `agora_ap_processor_release()`.
#[derive(Debug)]
pub struct ApProcessor {
    pub(crate) inner: Processor,
}
