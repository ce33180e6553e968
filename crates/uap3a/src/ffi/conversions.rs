//! Conversions between C API types and Rust types.

use std::ffi::{CStr, c_char};
use std::ops::Range;
use std::{ptr, slice};

use crate::config::{
    AecConfig, AecFilterLength, AecModelType, AecSuppressionMode, AgcConfig, AiAecSuppressionMode,
    AnsConfig, AnsModelType, AnsSuppressionMode, BghvsConfig, BghvsSuppressionMode, ConfigError,
    ProcessorConfig,
};
use crate::engine::EngineState;
use crate::frame::{AudioFrame, FrameError, FrameHeader};
use crate::processor::ReferenceMode;
use crate::service::ServiceConfig;

use super::types::{
    ApAecConfig, ApAgcConfig, ApAnsConfig, ApAudioFrame, ApBghvsConfig, ApProcessorConfig,
    ApProcessorState, ApServiceConfig,
};

// ---------------------------------------------------------------------------
// ApProcessorConfig <-> ProcessorConfig
// ---------------------------------------------------------------------------

impl ApProcessorConfig {
    /// Maps every field to `Some`, verbatim. Enum values the crate does not
    /// know become `Unknown` and are left for the engine to judge.
    pub(crate) fn to_rust(self) -> ProcessorConfig {
        ProcessorConfig {
            aec: self.aec_config.to_rust(),
            ans: self.ans_config.to_rust(),
            agc: self.agc_config.to_rust(),
            bghvs: self.bghvs_config.to_rust(),
        }
    }

    pub(crate) fn reference_mode(self) -> Result<ReferenceMode, ConfigError> {
        ReferenceMode::from_i32(self.reference_mode).ok_or(ConfigError::UnknownVariant {
            field: "reference_mode",
            value: self.reference_mode,
        })
    }

    /// Flattens `config`; unset fields take the recommended value.
    pub(crate) fn from_rust(config: &ProcessorConfig, reference_mode: ReferenceMode) -> Self {
        Self {
            aec_config: ApAecConfig::from_rust(&config.aec),
            ans_config: ApAnsConfig::from_rust(&config.ans),
            agc_config: ApAgcConfig::from_rust(&config.agc),
            bghvs_config: ApBghvsConfig::from_rust(&config.bghvs),
            reference_mode: reference_mode.as_i32(),
        }
    }
}

impl ApAecConfig {
    fn to_rust(self) -> AecConfig {
        AecConfig {
            enabled: Some(self.enabled),
            stereo_aec_enabled: Some(self.stereo_aec_enabled),
            enable_aec_auto_reset: Some(self.enable_aec_auto_reset),
            aec_startup_max_suppress_time_ms: Some(self.aec_startup_max_suppress_time_ms),
            filter_length: Some(AecFilterLength::from_i32(self.filter_length)),
            aec_model_type: Some(AecModelType::from_i32(self.aec_model_type)),
            aec_suppression_mode: Some(AecSuppressionMode::from_i32(self.aec_suppression_mode)),
            ai_aec_suppression_mode: Some(AiAecSuppressionMode::from_i32(
                self.ai_aec_suppression_mode,
            )),
        }
    }

    fn from_rust(config: &AecConfig) -> Self {
        let base = ProcessorConfig::recommended().aec;
        let pick = |value: Option<i32>, fallback: Option<i32>| value.or(fallback).unwrap_or(0);
        Self {
            enabled: config.enabled.or(base.enabled).unwrap_or(false),
            stereo_aec_enabled: config
                .stereo_aec_enabled
                .or(base.stereo_aec_enabled)
                .unwrap_or(false),
            enable_aec_auto_reset: config
                .enable_aec_auto_reset
                .or(base.enable_aec_auto_reset)
                .unwrap_or(false),
            aec_startup_max_suppress_time_ms: pick(
                config.aec_startup_max_suppress_time_ms,
                base.aec_startup_max_suppress_time_ms,
            ),
            filter_length: pick(
                config.filter_length.map(AecFilterLength::as_i32),
                base.filter_length.map(AecFilterLength::as_i32),
            ),
            aec_model_type: pick(
                config.aec_model_type.map(AecModelType::as_i32),
                base.aec_model_type.map(AecModelType::as_i32),
            ),
            ai_aec_suppression_mode: pick(
                config.ai_aec_suppression_mode.map(AiAecSuppressionMode::as_i32),
                base.ai_aec_suppression_mode.map(AiAecSuppressionMode::as_i32),
            ),
            aec_suppression_mode: pick(
                config.aec_suppression_mode.map(AecSuppressionMode::as_i32),
                base.aec_suppression_mode.map(AecSuppressionMode::as_i32),
            ),
        }
    }
}

impl ApAnsConfig {
    fn to_rust(self) -> AnsConfig {
        AnsConfig {
            enabled: Some(self.enabled),
            suppression_mode: Some(AnsSuppressionMode::from_i32(self.suppression_mode)),
            ans_model_type: Some(AnsModelType::from_i32(self.ans_model_type)),
            speech_protect_threshold: Some(self.speech_protect_threshold),
        }
    }

    fn from_rust(config: &AnsConfig) -> Self {
        let base = ProcessorConfig::recommended().ans;
        Self {
            enabled: config.enabled.or(base.enabled).unwrap_or(false),
            suppression_mode: config
                .suppression_mode
                .or(base.suppression_mode)
                .map_or(0, AnsSuppressionMode::as_i32),
            ans_model_type: config
                .ans_model_type
                .or(base.ans_model_type)
                .map_or(0, AnsModelType::as_i32),
            speech_protect_threshold: config
                .speech_protect_threshold
                .or(base.speech_protect_threshold)
                .unwrap_or(100),
        }
    }
}

impl ApAgcConfig {
    fn to_rust(self) -> AgcConfig {
        AgcConfig {
            enabled: Some(self.enabled),
            use_analog_mode: Some(self.use_analog_mode),
            max_digital_gain_db: Some(self.max_digital_gain_db),
            target_level_db: Some(self.target_level_db),
            curve_slope: Some(self.curve_slope),
        }
    }

    fn from_rust(config: &AgcConfig) -> Self {
        let base = ProcessorConfig::recommended().agc;
        Self {
            enabled: config.enabled.or(base.enabled).unwrap_or(false),
            use_analog_mode: config
                .use_analog_mode
                .or(base.use_analog_mode)
                .unwrap_or(false),
            max_digital_gain_db: config
                .max_digital_gain_db
                .or(base.max_digital_gain_db)
                .unwrap_or(0),
            target_level_db: config.target_level_db.or(base.target_level_db).unwrap_or(0),
            curve_slope: config.curve_slope.or(base.curve_slope).unwrap_or(0),
        }
    }
}

impl ApBghvsConfig {
    fn to_rust(self) -> BghvsConfig {
        BghvsConfig {
            enabled: Some(self.enabled),
            sos_len_ms: Some(self.sos_len_ms),
            eos_len_ms: Some(self.eos_len_ms),
            suppression_mode: Some(BghvsSuppressionMode::from_i32(self.suppression_mode)),
            delay_frames: Some(self.delay_frames),
        }
    }

    fn from_rust(config: &BghvsConfig) -> Self {
        let base = ProcessorConfig::recommended().bghvs;
        Self {
            enabled: config.enabled.or(base.enabled).unwrap_or(false),
            sos_len_ms: config.sos_len_ms.or(base.sos_len_ms).unwrap_or(0),
            eos_len_ms: config.eos_len_ms.or(base.eos_len_ms).unwrap_or(0),
            suppression_mode: config
                .suppression_mode
                .or(base.suppression_mode)
                .map_or(0, BghvsSuppressionMode::as_i32),
            delay_frames: config.delay_frames.or(base.delay_frames).unwrap_or(0),
        }
    }
}

// ---------------------------------------------------------------------------
// ApServiceConfig -> ServiceConfig
// ---------------------------------------------------------------------------

/// Copies a nullable C string; null reads as empty.
///
/// # Safety
///
/// A non-null `ptr` must point to a NUL-terminated string.
unsafe fn copy_c_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // Safety: forwarded from the caller.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

impl ApServiceConfig {
    /// Copies the three strings out of the caller's memory.
    ///
    /// # Safety
    ///
    /// Each non-null pointer must reference a NUL-terminated string.
    pub(crate) unsafe fn to_rust(&self) -> ServiceConfig {
        // Safety: forwarded from the caller.
        unsafe {
            ServiceConfig::new(
                copy_c_str(self.app_id),
                copy_c_str(self.license),
                copy_c_str(self.resource_path),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// ApAudioFrame -> AudioFrame
// ---------------------------------------------------------------------------

impl ApAudioFrame {
    pub(crate) fn header(&self) -> FrameHeader {
        FrameHeader {
            frame_type: self.frame_type,
            sample_rate_hz: self.sample_rate,
            channels: self.channels,
            samples_per_channel: self.samples_per_channel,
            bytes_per_sample: self.bytes_per_sample,
        }
    }

    /// Validates the record and borrows its buffer as samples.
    ///
    /// # Safety
    ///
    /// `buffer` must point to at least `channels * samples_per_channel`
    /// writable 16-bit samples that nothing else accesses for `'a`.
    pub(crate) unsafe fn as_audio_frame<'a>(&self) -> Result<AudioFrame<'a>, FrameError> {
        let format = self.header().validate()?;
        if self.buffer.is_null() {
            return Err(FrameError::NullBuffer);
        }
        let data = self.buffer.cast::<i16>();
        if !data.is_aligned() {
            return Err(FrameError::MisalignedBuffer);
        }
        // Safety: non-null and aligned; length and exclusivity are the
        // caller's contract.
        let samples = unsafe { slice::from_raw_parts_mut(data, format.num_samples()) };
        AudioFrame::new(format, samples)
    }

    /// Byte range the record claims, if its header is valid.
    fn byte_span(&self) -> Option<Range<usize>> {
        let format = self.header().validate().ok()?;
        let start = self.buffer.addr();
        let len = format.num_samples().checked_mul(size_of::<i16>())?;
        Some(start..start.checked_add(len)?)
    }

    /// Whether the sample buffers of `self` and `other` overlap.
    ///
    /// Records with an invalid header only compare their base pointers;
    /// validation rejects them before any buffer is touched.
    pub(crate) fn overlaps(&self, other: &Self) -> bool {
        if ptr::eq(self.buffer, other.buffer) {
            return true;
        }
        match (self.byte_span(), other.byte_span()) {
            (Some(a), Some(b)) => a.start < b.end && b.start < a.end,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineState -> ApProcessorState
// ---------------------------------------------------------------------------

impl ApProcessorState {
    pub(crate) fn from_rust(state: &EngineState) -> Self {
        Self {
            has_algorithm_latency_ms: state.algorithm_latency_ms.is_some(),
            algorithm_latency_ms: state.algorithm_latency_ms.unwrap_or_default(),
            has_algorithm_latency_samples: state.algorithm_latency_samples.is_some(),
            algorithm_latency_samples: state.algorithm_latency_samples.unwrap_or_default(),
            has_aec_estimated_delay_ms: state.aec_estimated_delay_ms.is_some(),
            aec_estimated_delay_ms: state.aec_estimated_delay_ms.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::{CString, c_void};
    use std::path::PathBuf;

    use proptest::prelude::*;
    use test_strategy::proptest;

    use super::*;

    fn recommended() -> ApProcessorConfig {
        ApProcessorConfig::from_rust(&ProcessorConfig::recommended(), ReferenceMode::PassThrough)
    }

    #[test]
    fn recommended_roundtrips() {
        let flat = recommended();
        assert_eq!(flat.to_rust(), ProcessorConfig::recommended());
        assert_eq!(flat.reference_mode(), Ok(ReferenceMode::PassThrough));
    }

    #[test]
    fn unset_fields_take_recommended_values() {
        let flat = ApProcessorConfig::from_rust(
            &ProcessorConfig::default(),
            ReferenceMode::MuteWhenAecDisabled,
        );
        assert_eq!(flat.ans_config, recommended().ans_config);
        assert_eq!(flat.bghvs_config, recommended().bghvs_config);
        assert_eq!(flat.reference_mode, 1);
    }

    #[test]
    fn every_field_maps_verbatim() {
        let mut flat = recommended();
        flat.aec_config.enabled = true;
        flat.aec_config.aec_startup_max_suppress_time_ms = 2_000;
        flat.aec_config.filter_length = 2;
        flat.ans_config.speech_protect_threshold = 50;
        flat.agc_config.max_digital_gain_db = -40;
        flat.bghvs_config.delay_frames = 3;

        let config = flat.to_rust();
        assert!(config.aec_enabled());
        assert_eq!(config.aec.aec_startup_max_suppress_time_ms, Some(2_000));
        assert_eq!(config.aec.filter_length, Some(AecFilterLength::Longest));
        assert_eq!(config.ans.speech_protect_threshold, Some(50));
        // No range validation here; the engine decides.
        assert_eq!(config.agc.max_digital_gain_db, Some(-40));
        assert_eq!(config.bghvs.delay_frames, Some(3));
    }

    #[test]
    fn unknown_enum_values_pass_through() {
        let mut flat = recommended();
        flat.bghvs_config.suppression_mode = 3;
        flat.aec_config.aec_model_type = 9;
        let config = flat.to_rust();
        assert_eq!(
            config.bghvs.suppression_mode,
            Some(BghvsSuppressionMode::Unknown(3))
        );
        assert_eq!(config.aec.aec_model_type, Some(AecModelType::Unknown(9)));
        assert_eq!(
            ApProcessorConfig::from_rust(&config, ReferenceMode::PassThrough),
            flat
        );
    }

    #[test]
    fn unknown_reference_mode_is_rejected() {
        let mut flat = recommended();
        flat.reference_mode = -1;
        assert_eq!(
            flat.reference_mode(),
            Err(ConfigError::UnknownVariant {
                field: "reference_mode",
                value: -1,
            })
        );
    }

    #[test]
    fn service_config_copies_strings() {
        let app_id = CString::new("my-app").unwrap();
        let path = CString::new("/opt/res").unwrap();
        let flat = ApServiceConfig {
            app_id: app_id.as_ptr(),
            license: ptr::null(),
            resource_path: path.as_ptr(),
        };
        // Safety: the CStrings outlive the call.
        let config = unsafe { flat.to_rust() };
        drop(app_id);
        assert_eq!(config.app_id, "my-app");
        assert_eq!(config.license, "");
        assert_eq!(config.resource_path, PathBuf::from("/opt/res"));
    }

    fn frame_over(buffer: &mut [i16], rate: i32, channels: i32) -> ApAudioFrame {
        ApAudioFrame {
            frame_type: 0,
            sample_rate: rate,
            channels,
            samples_per_channel: rate / 100,
            bytes_per_sample: 2,
            buffer: buffer.as_mut_ptr().cast::<c_void>(),
        }
    }

    #[test]
    fn frame_borrows_caller_buffer() {
        let mut buffer = vec![0i16; 320];
        let raw = frame_over(&mut buffer, 16_000, 2);
        // Safety: `buffer` holds 320 samples and is not touched meanwhile.
        let mut frame = unsafe { raw.as_audio_frame() }.unwrap();
        frame.samples_mut()[319] = 42;
        assert_eq!(buffer[319], 42);
    }

    #[test]
    fn frame_rejects_null_and_misaligned_buffers() {
        let mut buffer = vec![0i16; 161];
        let mut raw = frame_over(&mut buffer, 16_000, 1);
        raw.buffer = ptr::null_mut();
        // Safety: rejected before any dereference.
        assert_eq!(
            unsafe { raw.as_audio_frame() }.unwrap_err(),
            FrameError::NullBuffer
        );

        let base = buffer.as_mut_ptr().cast::<u8>();
        // Safety: one byte into a live allocation.
        raw.buffer = unsafe { base.add(1) }.cast::<c_void>();
        assert_eq!(
            unsafe { raw.as_audio_frame() }.unwrap_err(),
            FrameError::MisalignedBuffer
        );
    }

    #[test]
    fn overlap_detection() {
        let mut buffer = vec![0i16; 640];
        let a = frame_over(&mut buffer[..160], 16_000, 1);
        let b = frame_over(&mut buffer[160..320], 16_000, 1);
        let c = frame_over(&mut buffer[80..240], 16_000, 1);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&a));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn overlap_with_oversized_header_does_not_overflow() {
        let mut buffer = vec![0i16; 160];
        let a = frame_over(&mut buffer, 16_000, 1);
        let mut huge = a;
        huge.buffer = ptr::without_provenance_mut(usize::MAX - 1);
        huge.channels = i32::MAX;
        huge.samples_per_channel = i32::MAX;
        assert!(!a.overlaps(&huge));
        assert!(!huge.overlaps(&a));

        let mut top = frame_over(&mut buffer, 48_000, 2);
        top.buffer = ptr::without_provenance_mut(usize::MAX - 8);
        assert!(!a.overlaps(&top));
    }

    #[test]
    fn state_sets_flags_for_reported_values() {
        let state = ApProcessorState::from_rust(&EngineState {
            algorithm_latency_ms: Some(10),
            algorithm_latency_samples: None,
            aec_estimated_delay_ms: Some(0),
        });
        assert!(state.has_algorithm_latency_ms);
        assert_eq!(state.algorithm_latency_ms, 10);
        assert!(!state.has_algorithm_latency_samples);
        assert!(state.has_aec_estimated_delay_ms);
        assert_eq!(state.aec_estimated_delay_ms, 0);
    }

    #[proptest]
    fn known_enum_values_always_map(
        #[strategy(0i32..3)] filter_length: i32,
        #[strategy(0i32..3)] aec_model_type: i32,
        #[strategy(0i32..4)] ai_aec_mode: i32,
        #[strategy(0i32..5)] aec_mode: i32,
        #[strategy(0i32..4)] ans_mode: i32,
        #[strategy(0i32..3)] ans_model: i32,
        #[strategy(0i32..3)] bghvs_mode: i32,
        threshold: i32,
    ) {
        let mut flat = recommended();
        flat.aec_config.filter_length = filter_length;
        flat.aec_config.aec_model_type = aec_model_type;
        flat.aec_config.ai_aec_suppression_mode = ai_aec_mode;
        flat.aec_config.aec_suppression_mode = aec_mode;
        flat.ans_config.suppression_mode = ans_mode;
        flat.ans_config.ans_model_type = ans_model;
        flat.ans_config.speech_protect_threshold = threshold;
        flat.bghvs_config.suppression_mode = bghvs_mode;

        let config = flat.to_rust();
        let back = ApProcessorConfig::from_rust(&config, ReferenceMode::PassThrough);
        prop_assert_eq!(back, flat);
    }

    #[proptest]
    fn out_of_range_ans_mode_reaches_the_engine(#[strategy(any::<i32>())] mode: i32) {
        prop_assume!(!(0..4).contains(&mode));
        let mut flat = recommended();
        flat.ans_config.suppression_mode = mode;
        prop_assert_eq!(
            flat.to_rust().ans.suppression_mode,
            Some(AnsSuppressionMode::Unknown(mode))
        );
    }
}
