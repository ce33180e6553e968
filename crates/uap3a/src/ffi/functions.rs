//! Exported `extern "C"` functions.
//!
//! # Symbol prefix
//!
//! All public symbols use the `agora_ap_` prefix.

use std::collections::BTreeMap;
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::sync::{Arc, Mutex, PoisonError};
use std::{ptr, slice};

use crate::config::ProcessorConfig;
use crate::error::Error;
use crate::frame::{FRAME_LAYOUT_VERSION, FrameError};
use crate::processor::{Processor, ProcessorOptions, ReferenceMode};
use crate::service::Service;

use super::bridge::CallbackSink;
use super::panic_guard::{ffi_guard, ffi_guard_ptr, ffi_guard_void};
use super::registry;
use super::types::{
    ApAudioFrame, ApProcessor, ApProcessorConfig, ApProcessorEventHandler, ApProcessorState,
    ApService, ApServiceConfig,
};

const VERSION: &CStr = match CStr::from_bytes_with_nul(
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes(),
) {
    Ok(version) => version,
    Err(_) => c"unknown",
};

/// Version strings handed out so far, one per engine SDK version. They are
/// leaked so every returned pointer stays valid for the process lifetime.
static VERSION_STRINGS: Mutex<BTreeMap<&'static str, &'static CStr>> = Mutex::new(BTreeMap::new());

fn version_string() -> &'static CStr {
    let Some(sdk) = registry::engine_sdk_version() else {
        return VERSION;
    };
    let mut strings = VERSION_STRINGS
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    *strings.entry(sdk).or_insert_with(|| {
        let text = format!("{} (engine {sdk})", env!("CARGO_PKG_VERSION"));
        match CString::new(text) {
            Ok(text) => &*Box::leak(text.into_boxed_c_str()),
            Err(_) => VERSION,
        }
    })
}

fn status(result: Result<(), Error>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(err) => err.code(),
    }
}

// ─── Version ─────────────────────────────────────────────────────────

/// Returns the crate version followed by the engine SDK version, e.g.
/// `0.1.0 (engine 4.2.1)`, or the crate version alone if no engine can be
/// built.
///
/// The returned pointer is valid for the lifetime of the process.
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_version() -> *const c_char {
    let version: *mut c_char = ffi_guard_ptr! {
        version_string().as_ptr().cast_mut()
    };
    version.cast_const()
}

/// Returns the layout version of [`ApAudioFrame`].
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_frame_layout_version() -> u32 {
    FRAME_LAYOUT_VERSION
}

// ─── Service ─────────────────────────────────────────────────────────

/// Returns the process-wide service handle, creating it on first call.
///
/// The handle stays valid until [`agora_ap_service_release()`].
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_service_create() -> *mut ApService {
    ffi_guard_ptr! {
        registry::create_service()
    }
}

/// Initializes the service: copies `config`, loads the model files found
/// under its resource path and keeps a copy of `event_handler` (nullable)
/// for processors created later.
///
/// Returns `-1` if `service` is not the live handle or `config` is null,
/// `0` otherwise. A second call returns `0` and changes nothing. Missing
/// model files are logged and do not fail the call.
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_service_initialize(
    service: *mut ApService,
    config: *const ApServiceConfig,
    event_handler: *const ApProcessorEventHandler,
) -> c_int {
    ffi_guard! {
        if service.is_null() || config.is_null() {
            return Error::InvalidHandle.code();
        }
        let event_handler = if event_handler.is_null() {
            ApProcessorEventHandler::default()
        } else {
            // Safety: the caller guarantees a non-null handler is valid.
            unsafe { *event_handler }
        };

        let result = registry::with_service(service, |ap| {
            if ap.is_initialized() {
                tracing::debug!("service already initialized");
                return;
            }
            // Safety: the caller guarantees the config and its strings are
            // valid for the duration of this call.
            let config = unsafe { (*config).to_rust() };
            ap.service = Some(Service::initialize(config));
            ap.event_handler = event_handler;
        });
        status(result)
    }
}

/// Destroys the service if `service` is the live handle; otherwise logs and
/// does nothing.
///
/// Processors created from the service remain usable.
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_service_release(service: *mut ApService) {
    ffi_guard_void! {
        registry::release_service(service);
    }
}

// ─── Configuration ───────────────────────────────────────────────────

/// Returns the recommended processor configuration.
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_processor_config_create() -> ApProcessorConfig {
    ApProcessorConfig::from_rust(&ProcessorConfig::recommended(), ReferenceMode::default())
}

/// Writes a human-readable description of `config` into `buf`.
///
/// At most `buf_len - 1` bytes are written, followed by a NUL. `buf` may be
/// null to query the size. Returns the full description length in bytes
/// (excluding the NUL), `-1` if `config` is null or `-4` if its reference
/// mode is unknown. Engine enum values outside the known set are shown as
/// `Unknown(n)`.
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_processor_config_get_message(
    config: *const ApProcessorConfig,
    buf: *mut c_char,
    buf_len: usize,
) -> c_int {
    ffi_guard! {
        if config.is_null() {
            return Error::InvalidHandle.code();
        }
        // Safety: the caller guarantees the pointer is valid.
        let flat = unsafe { *config };
        let mode = match flat.reference_mode() {
            Ok(mode) => mode,
            Err(err) => return Error::from(err).code(),
        };
        let config = flat.to_rust();
        let message = format!("{config}\nreference_mode: {mode:?}");
        let bytes = message.as_bytes();

        if !buf.is_null() && buf_len > 0 {
            let written = bytes.len().min(buf_len - 1);
            // Safety: the caller guarantees `buf` holds `buf_len` bytes.
            let out = unsafe { slice::from_raw_parts_mut(buf.cast::<u8>(), buf_len) };
            out[..written].copy_from_slice(&bytes[..written]);
            out[written] = 0;
        }
        c_int::try_from(bytes.len()).unwrap_or(c_int::MAX)
    }
}

// ─── Processor lifecycle ─────────────────────────────────────────────

fn create_processor(
    service: *mut ApService,
    config: ApProcessorConfig,
    user_data: Option<*mut c_void>,
) -> *mut ApProcessor {
    let rust_config = config.to_rust();
    let reference_mode = match config.reference_mode() {
        Ok(mode) => mode,
        Err(err) => {
            tracing::warn!(%err, "processor not created");
            return ptr::null_mut();
        }
    };
    let (service, event_handler) = match registry::service_snapshot(service) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::warn!(%err, "processor not created");
            return ptr::null_mut();
        }
    };
    let Some(engine) = registry::new_engine() else {
        tracing::warn!("engine factory produced no engine");
        return ptr::null_mut();
    };

    // The handle doubles as the default callback token, so it is reserved
    // before the engine can raise its first notification.
    let token = registry::next_token();
    let user_data = user_data.unwrap_or_else(|| ptr::without_provenance_mut(token));
    let sink = Arc::new(CallbackSink::new(event_handler, user_data));

    let processor = service.create_processor(
        engine,
        sink,
        &rust_config,
        ProcessorOptions {
            reference_mode,
            ..ProcessorOptions::default()
        },
    );
    registry::insert_processor(token, processor)
}

/// Creates a processor from an initialized service.
///
/// Callbacks receive the returned handle as `user_data`. Returns `NULL` if
/// `service` is not the live, initialized handle, if the reference mode is
/// unknown or if no engine could be built. Engine enum values are passed
/// through unchecked; engine failures during setup, including rejected
/// configuration, are logged and reported through `on_error`.
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_processor_create(
    service: *mut ApService,
    config: ApProcessorConfig,
) -> *mut ApProcessor {
    ffi_guard_ptr! {
        create_processor(service, config, None)
    }
}

/// Like [`agora_ap_processor_create()`], with an explicit callback token.
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_processor_create_with_user_data(
    service: *mut ApService,
    config: ApProcessorConfig,
    user_data: *mut c_void,
) -> *mut ApProcessor {
    ffi_guard_ptr! {
        create_processor(service, config, Some(user_data))
    }
}

/// Releases the engine and invalidates the handle.
///
/// Returns `-1` for null and `-2` if the handle is not a live processor,
/// for example on a second release. Handles are never reused, so a stale
/// handle cannot reach a processor created later.
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_processor_release(processor: *mut ApProcessor) -> c_int {
    ffi_guard! {
        status(registry::remove_processor(processor))
    }
}

/// Runs `f` on a live processor, mapping the outcome to a status code.
fn with_processor(
    processor: *mut ApProcessor,
    f: impl FnOnce(&mut Processor) -> Result<(), Error>,
) -> c_int {
    status(registry::with_processor(processor, f).and_then(|result| result))
}

/// Whether `processor` is live and may be driven without a reference frame.
fn accepts_null_reference(processor: *mut ApProcessor) -> bool {
    registry::with_processor(processor, |processor| {
        processor.reference_mode() == ReferenceMode::MuteWhenAecDisabled
    })
    .unwrap_or(false)
}

// ─── Processing ──────────────────────────────────────────────────────

/// Processes one 10 ms capture frame in place.
///
/// `ref_frame` is the far-end frame fed to the echo canceller first. It may
/// be null only when the processor's reference mode is
/// `MuteWhenAecDisabled`. Returns `-1` for a null argument the processor
/// cannot do without (checked before anything else, so a released handle
/// with a null reference also gets `-1`), `-2` for a released handle, `-3`
/// for a frame that fails validation, else the engine's status for the
/// capture frame.
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_processor_process_stream(
    processor: *mut ApProcessor,
    frame: *mut ApAudioFrame,
    ref_frame: *mut ApAudioFrame,
) -> c_int {
    ffi_guard! {
        if processor.is_null() || frame.is_null() {
            return Error::InvalidHandle.code();
        }
        if ref_frame.is_null() && !accepts_null_reference(processor) {
            return Error::MissingReference.code();
        }
        with_processor(processor, |processor| {
            // Safety: the caller guarantees non-null frames are valid records.
            let frame = unsafe { *frame };
            let reference = (!ref_frame.is_null()).then(|| unsafe { *ref_frame });
            if reference.is_some_and(|reference| reference.overlaps(&frame)) {
                return Err(FrameError::SharedBuffer.into());
            }

            // Safety: buffers are caller-owned, sized per the validated
            // header and do not overlap.
            let mut near = unsafe { frame.as_audio_frame() }?;
            let mut far = match reference {
                Some(reference) => Some(unsafe { reference.as_audio_frame() }?),
                None => None,
            };
            processor.process_stream(&mut near, far.as_mut())
        })
    }
}

// ─── Runtime control ─────────────────────────────────────────────────

/// Applies a new configuration and reference mode.
///
/// Returns `-4` without touching the engine if the reference mode is
/// unknown. Engine enum values are passed through unchecked. Sections are
/// applied AEC, ANS, AGC, BGHVS; the first engine failure stops the
/// sequence and its status is returned verbatim.
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_processor_apply_config(
    processor: *mut ApProcessor,
    config: ApProcessorConfig,
) -> c_int {
    ffi_guard! {
        with_processor(processor, |processor| {
            let reference_mode = config.reference_mode()?;
            processor.apply_config(&config.to_rust())?;
            processor.set_reference_mode(reference_mode);
            Ok(())
        })
    }
}

/// Sets the delay applied before every frame (engine range 60..=500 ms).
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_processor_set_stream_delay_ms(
    processor: *mut ApProcessor,
    delay_ms: c_int,
) -> c_int {
    ffi_guard! {
        with_processor(processor, |processor| processor.set_stream_delay_ms(delay_ms))
    }
}

/// Sets the analog level applied before every frame (engine range 0..=255).
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_processor_set_stream_analog_level(
    processor: *mut ApProcessor,
    level: c_int,
) -> c_int {
    ffi_guard! {
        with_processor(processor, |processor| processor.set_stream_analog_level(level))
    }
}

/// Reads the analog level recommended by AGC into `level_out`.
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_processor_get_stream_analog_level(
    processor: *mut ApProcessor,
    level_out: *mut c_int,
) -> c_int {
    ffi_guard! {
        if level_out.is_null() {
            return Error::InvalidHandle.code();
        }
        with_processor(processor, |processor| {
            let level = processor.stream_analog_level()?;
            // Safety: checked non-null above; the caller guarantees validity.
            unsafe { ptr::write(level_out, level) };
            Ok(())
        })
    }
}

/// Sets the output gain (engine range 0..=400).
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_processor_set_gain(processor: *mut ApProcessor, gain: c_int) -> c_int {
    ffi_guard! {
        with_processor(processor, |processor| processor.set_gain(gain))
    }
}

/// Sets a private engine parameter. `key` must be NUL-terminated UTF-8.
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_processor_set_parameter(
    processor: *mut ApProcessor,
    key: *const c_char,
    value: c_int,
) -> c_int {
    ffi_guard! {
        if key.is_null() {
            return Error::InvalidHandle.code();
        }
        // Safety: the caller guarantees a NUL-terminated string.
        let Ok(key) = unsafe { CStr::from_ptr(key) }.to_str() else {
            return Error::InvalidHandle.code();
        };
        with_processor(processor, |processor| processor.set_parameter(key, value))
    }
}

/// Fills `state_out` with the engine's latency figures at `sample_rate_hz`.
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_processor_get_state(
    processor: *mut ApProcessor,
    sample_rate_hz: u32,
    state_out: *mut ApProcessorState,
) -> c_int {
    ffi_guard! {
        if state_out.is_null() {
            return Error::InvalidHandle.code();
        }
        with_processor(processor, |processor| {
            let state = processor.state(sample_rate_hz)?;
            // Safety: checked non-null above; the caller guarantees validity.
            unsafe { ptr::write(state_out, ApProcessorState::from_rust(&state)) };
            Ok(())
        })
    }
}

/// Resets the engine. Call after an AEC malfunction event, from outside
/// the callback.
#[unsafe(no_mangle)]
pub extern "C" fn agora_ap_processor_reset(processor: *mut ApProcessor) -> c_int {
    ffi_guard! {
        with_processor(processor, Processor::reset)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::ffi::CString;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{LazyLock, Mutex};

    use super::*;
    use crate::engine::{AudioProcessingEngine, LoopbackEngine};
    use crate::events::EngineEvent;
    use crate::ffi::registry::{FactoryGuard, serial};
    use crate::testing::{Call, CallLog, RecordingEngine, Statuses};

    static LOG: LazyLock<CallLog> = LazyLock::new(CallLog::new);
    static CALLBACKS: Mutex<Vec<(&str, usize, c_int)>> = Mutex::new(Vec::new());

    fn recording() -> Option<Box<dyn AudioProcessingEngine>> {
        Some(Box::new(RecordingEngine::new(LOG.clone())))
    }

    fn failing_streams() -> Option<Box<dyn AudioProcessingEngine>> {
        Some(Box::new(RecordingEngine::with_statuses(
            LOG.clone(),
            Statuses {
                init: -50,
                process_reverse_stream: -11,
                process_stream: -22,
                event_on_process: Some(EngineEvent::AecMalfunction),
                ..Statuses::default()
            },
        )))
    }

    fn no_engine() -> Option<Box<dyn AudioProcessingEngine>> {
        None
    }

    unsafe extern "C" fn on_event(user_data: *mut c_void, code: c_int) {
        CALLBACKS
            .lock()
            .unwrap()
            .push(("event", user_data as usize, code));
    }

    unsafe extern "C" fn on_error(user_data: *mut c_void, code: c_int) {
        CALLBACKS
            .lock()
            .unwrap()
            .push(("error", user_data as usize, code));
    }

    /// C strings kept alive for an `ApServiceConfig`.
    struct ServiceStrings {
        app_id: CString,
        license: CString,
        resource_path: CString,
    }

    impl ServiceStrings {
        fn new(app_id: &str, resource_path: &str) -> Self {
            Self {
                app_id: CString::new(app_id).unwrap(),
                license: CString::new("license").unwrap(),
                resource_path: CString::new(resource_path).unwrap(),
            }
        }

        fn config(&self) -> ApServiceConfig {
            ApServiceConfig {
                app_id: self.app_id.as_ptr(),
                license: self.license.as_ptr(),
                resource_path: self.resource_path.as_ptr(),
            }
        }
    }

    fn initialized_service(strings: &ServiceStrings) -> *mut ApService {
        let service = agora_ap_service_create();
        let handler = ApProcessorEventHandler {
            on_event: Some(on_event),
            on_error: Some(on_error),
        };
        assert_eq!(
            agora_ap_service_initialize(service, &strings.config(), &handler),
            0
        );
        service
    }

    fn frame(buffer: &mut [i16], rate: i32) -> ApAudioFrame {
        ApAudioFrame {
            frame_type: 0,
            sample_rate: rate,
            channels: 1,
            samples_per_channel: rate / 100,
            bytes_per_sample: 2,
            buffer: buffer.as_mut_ptr().cast::<c_void>(),
        }
    }

    fn foreign<T>() -> *mut T {
        ptr::without_provenance_mut(usize::MAX)
    }

    fn version() -> &'static str {
        // Safety: agora_ap_version returns a static NUL-terminated string.
        unsafe { CStr::from_ptr(agora_ap_version()) }.to_str().unwrap()
    }

    #[test]
    fn version_names_crate_and_engine() {
        let _serial = serial();
        let expected = format!(
            "{} (engine {})",
            env!("CARGO_PKG_VERSION"),
            LoopbackEngine::SDK_VERSION
        );
        assert_eq!(version(), expected);
        // Repeated calls hand out the same pointer.
        assert_eq!(agora_ap_version(), agora_ap_version());

        {
            let _factory = FactoryGuard::install(recording);
            assert!(version().ends_with("(engine recording)"));
        }
        {
            let _factory = FactoryGuard::install(no_engine);
            assert_eq!(version(), env!("CARGO_PKG_VERSION"));
        }
        assert_eq!(agora_ap_frame_layout_version(), 1);
    }

    #[test]
    fn service_create_is_idempotent_and_first_init_wins() {
        let _serial = serial();
        let first = ServiceStrings::new("first", "/nonexistent/a");
        let second = ServiceStrings::new("second", "/nonexistent/b");

        let service = agora_ap_service_create();
        assert_eq!(agora_ap_service_create(), service);
        assert_eq!(
            agora_ap_service_initialize(service, &first.config(), ptr::null()),
            0
        );
        assert_eq!(
            agora_ap_service_initialize(service, &second.config(), ptr::null()),
            0
        );

        let (snapshot, _) = registry::service_snapshot(service).unwrap();
        assert_eq!(snapshot.config().app_id, "first");
        assert_eq!(
            snapshot.config().resource_path,
            PathBuf::from("/nonexistent/a/")
        );
        agora_ap_service_release(service);
    }

    #[test]
    fn initialize_rejects_foreign_handle_and_null_config() {
        let _serial = serial();
        let strings = ServiceStrings::new("app", "/nonexistent");
        let service = agora_ap_service_create();
        assert_eq!(
            agora_ap_service_initialize(foreign(), &strings.config(), ptr::null()),
            -1
        );
        assert_eq!(
            agora_ap_service_initialize(service, ptr::null(), ptr::null()),
            -1
        );
        // Nothing changed: the real handle still initializes normally.
        assert!(agora_ap_processor_create(service, agora_ap_processor_config_create()).is_null());
        assert_eq!(
            agora_ap_service_initialize(service, &strings.config(), ptr::null()),
            0
        );
        agora_ap_service_release(service);
    }

    #[test]
    fn processor_requires_initialized_service() {
        let _serial = serial();
        let config = agora_ap_processor_config_create();
        assert!(agora_ap_processor_create(ptr::null_mut(), config).is_null());

        let service = agora_ap_service_create();
        assert!(agora_ap_processor_create(service, config).is_null());
        agora_ap_service_release(service);
    }

    #[test]
    fn stale_release_keeps_live_service() {
        let _serial = serial();
        let strings = ServiceStrings::new("app", "/nonexistent");
        let service = initialized_service(&strings);

        agora_ap_service_release(foreign());
        let processor = agora_ap_processor_create(service, agora_ap_processor_config_create());
        assert!(!processor.is_null());
        assert_eq!(agora_ap_processor_release(processor), 0);
        agora_ap_service_release(service);
    }

    #[test]
    fn recreated_service_rejects_the_old_handle() {
        let _serial = serial();
        let strings = ServiceStrings::new("app", "/nonexistent");
        let stale = agora_ap_service_create();
        agora_ap_service_release(stale);

        let live = agora_ap_service_create();
        assert_eq!(
            agora_ap_service_initialize(stale, &strings.config(), ptr::null()),
            -1
        );
        agora_ap_service_release(stale);
        assert_eq!(
            agora_ap_service_initialize(live, &strings.config(), ptr::null()),
            0
        );
        let processor = agora_ap_processor_create(live, agora_ap_processor_config_create());
        assert!(!processor.is_null());
        assert_eq!(agora_ap_processor_release(processor), 0);
        agora_ap_service_release(live);
    }

    #[test]
    fn default_config_matches_recommended_values() {
        let config = agora_ap_processor_config_create();
        let aec = config.aec_config;
        assert!(!aec.enabled && !aec.stereo_aec_enabled && !aec.enable_aec_auto_reset);
        assert_eq!(aec.aec_startup_max_suppress_time_ms, (1 << 30) - 1);
        assert_eq!(
            (
                aec.filter_length,
                aec.aec_model_type,
                aec.ai_aec_suppression_mode,
                aec.aec_suppression_mode
            ),
            (0, 1, 0, 2)
        );

        let ans = config.ans_config;
        assert!(ans.enabled);
        assert_eq!(
            (ans.suppression_mode, ans.ans_model_type, ans.speech_protect_threshold),
            (1, 2, 100)
        );

        let agc = config.agc_config;
        assert!(!agc.enabled && !agc.use_analog_mode);
        assert_eq!(
            (agc.max_digital_gain_db, agc.target_level_db, agc.curve_slope),
            (12, 6, 17)
        );

        let bghvs = config.bghvs_config;
        assert!(bghvs.enabled);
        assert_eq!(
            (
                bghvs.sos_len_ms,
                bghvs.eos_len_ms,
                bghvs.suppression_mode,
                bghvs.delay_frames
            ),
            (160, 500, 1, 12)
        );
        assert_eq!(config.reference_mode, 0);
    }

    #[test]
    fn config_message_reports_length_and_truncates() {
        let config = agora_ap_processor_config_create();
        assert_eq!(
            agora_ap_processor_config_get_message(ptr::null(), ptr::null_mut(), 0),
            -1
        );

        let needed = agora_ap_processor_config_get_message(&config, ptr::null_mut(), 0);
        assert!(needed > 0);

        let mut full = vec![0 as c_char; needed as usize + 1];
        assert_eq!(
            agora_ap_processor_config_get_message(&config, full.as_mut_ptr(), full.len()),
            needed
        );
        // Safety: the function NUL-terminated the buffer.
        let text = unsafe { CStr::from_ptr(full.as_ptr()) }.to_str().unwrap();
        assert!(text.starts_with("aec: enabled=false"));
        assert!(text.ends_with("reference_mode: PassThrough"));

        let mut short = [0x7f as c_char; 8];
        assert_eq!(
            agora_ap_processor_config_get_message(&config, short.as_mut_ptr(), short.len()),
            needed
        );
        // Safety: the function NUL-terminated the buffer.
        let text = unsafe { CStr::from_ptr(short.as_ptr()) }.to_str().unwrap();
        assert_eq!(text, "aec: en");

        let mut unknown = config;
        unknown.ans_config.suppression_mode = 42;
        let needed = agora_ap_processor_config_get_message(&unknown, ptr::null_mut(), 0);
        let mut full = vec![0 as c_char; needed as usize + 1];
        assert_eq!(
            agora_ap_processor_config_get_message(&unknown, full.as_mut_ptr(), full.len()),
            needed
        );
        // Safety: the function NUL-terminated the buffer.
        let text = unsafe { CStr::from_ptr(full.as_ptr()) }.to_str().unwrap();
        assert!(text.contains("ans: enabled=true suppression=Unknown(42)"));

        let mut bad_mode = config;
        bad_mode.reference_mode = 5;
        assert_eq!(
            agora_ap_processor_config_get_message(&bad_mode, ptr::null_mut(), 0),
            -4
        );
    }

    #[test]
    fn unknown_enum_values_reach_the_engine() {
        let _serial = serial();
        let strings = ServiceStrings::new("app", "/nonexistent");
        let service = initialized_service(&strings);

        let mut unknown = agora_ap_processor_config_create();
        unknown.aec_config.aec_model_type = 9;
        let processor = agora_ap_processor_create(service, unknown);
        assert!(!processor.is_null());
        assert_eq!(
            agora_ap_processor_apply_config(processor, unknown),
            LoopbackEngine::ERR_INVALID_PARAMETER
        );
        assert_eq!(
            agora_ap_processor_apply_config(processor, agora_ap_processor_config_create()),
            0
        );

        let mut bad_mode = agora_ap_processor_config_create();
        bad_mode.reference_mode = 7;
        assert_eq!(agora_ap_processor_apply_config(processor, bad_mode), -4);
        bad_mode.aec_config.aec_model_type = 9;
        assert!(agora_ap_processor_create(service, bad_mode).is_null());

        assert_eq!(agora_ap_processor_release(processor), 0);
        agora_ap_service_release(service);
    }

    #[test]
    fn unknown_enum_value_is_forwarded_verbatim() {
        let _serial = serial();
        let _factory = FactoryGuard::install(recording);
        let strings = ServiceStrings::new("app", "/nonexistent");
        let service = initialized_service(&strings);
        let processor = agora_ap_processor_create(service, agora_ap_processor_config_create());
        LOG.clear();

        let mut unknown = agora_ap_processor_config_create();
        unknown.ans_config.suppression_mode = 42;
        assert_eq!(agora_ap_processor_apply_config(processor, unknown), 0);
        assert!(LOG.calls().iter().any(|call| matches!(
            call,
            Call::SetAns(ans) if ans.suppression_mode.map(|mode| mode.as_i32()) == Some(42)
        )));

        assert_eq!(agora_ap_processor_release(processor), 0);
        agora_ap_service_release(service);
    }

    #[test]
    fn missing_engine_yields_null() {
        let _serial = serial();
        let _factory = FactoryGuard::install(no_engine);
        let strings = ServiceStrings::new("app", "/nonexistent");
        let service = initialized_service(&strings);
        assert!(agora_ap_processor_create(service, agora_ap_processor_config_create()).is_null());
        agora_ap_service_release(service);
    }

    #[test]
    fn double_release_returns_released() {
        let _serial = serial();
        let strings = ServiceStrings::new("app", "/nonexistent");
        let service = initialized_service(&strings);
        let processor = agora_ap_processor_create(service, agora_ap_processor_config_create());

        assert_eq!(agora_ap_processor_release(ptr::null_mut()), -1);
        assert_eq!(agora_ap_processor_release(processor), 0);
        assert_eq!(agora_ap_processor_release(processor), -2);
        assert_eq!(agora_ap_processor_set_gain(processor, 100), -2);
        agora_ap_service_release(service);
    }

    #[test]
    fn stale_handle_cannot_release_a_newer_processor() {
        let _serial = serial();
        let strings = ServiceStrings::new("app", "/nonexistent");
        let service = initialized_service(&strings);
        let config = agora_ap_processor_config_create();

        let stale = agora_ap_processor_create(service, config);
        assert_eq!(agora_ap_processor_release(stale), 0);
        // Fill the allocator's free slot with new processors.
        let live: Vec<_> = (0..4)
            .map(|_| agora_ap_processor_create(service, config))
            .collect();
        assert!(live.iter().all(|processor| !processor.is_null() && *processor != stale));

        assert_eq!(agora_ap_processor_release(stale), -2);
        assert_eq!(agora_ap_processor_set_gain(stale, 100), -2);
        for processor in live {
            assert_eq!(agora_ap_processor_set_gain(processor, 100), 0);
            assert_eq!(agora_ap_processor_release(processor), 0);
        }
        agora_ap_service_release(service);
    }

    #[test]
    fn processor_outlives_service_release() {
        let _serial = serial();
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("CLDNNWeights.bin"), [3u8; 32]).unwrap();
        let strings = ServiceStrings::new("app", dir.path().to_str().unwrap());
        let service = initialized_service(&strings);
        let processor = agora_ap_processor_create(service, agora_ap_processor_config_create());
        agora_ap_service_release(service);

        let mut near = vec![1i16; 160];
        let mut far = vec![0i16; 160];
        let mut near_frame = frame(&mut near, 16_000);
        let mut far_frame = frame(&mut far, 16_000);
        assert_eq!(
            agora_ap_processor_process_stream(processor, &mut near_frame, &mut far_frame),
            0
        );
        assert_eq!(near, vec![1i16; 160]);
        assert_eq!(agora_ap_processor_release(processor), 0);
    }

    #[test]
    fn process_stream_status_codes() {
        let _serial = serial();
        let strings = ServiceStrings::new("app", "/nonexistent");
        let service = initialized_service(&strings);
        let processor = agora_ap_processor_create(service, agora_ap_processor_config_create());

        let mut near = vec![0i16; 160];
        let mut far = vec![0i16; 160];
        let mut near_frame = frame(&mut near, 16_000);
        let mut far_frame = frame(&mut far, 16_000);

        assert_eq!(
            agora_ap_processor_process_stream(ptr::null_mut(), &mut near_frame, &mut far_frame),
            -1
        );
        assert_eq!(
            agora_ap_processor_process_stream(processor, ptr::null_mut(), &mut far_frame),
            -1
        );
        // PassThrough needs a reference.
        assert_eq!(
            agora_ap_processor_process_stream(processor, &mut near_frame, ptr::null_mut()),
            -1
        );

        let mut wrong_size = near_frame;
        wrong_size.samples_per_channel = 159;
        assert_eq!(
            agora_ap_processor_process_stream(processor, &mut wrong_size, &mut far_frame),
            -3
        );
        assert_eq!(
            agora_ap_processor_process_stream(processor, &mut near_frame, &mut near_frame.clone()),
            -3
        );
        assert_eq!(
            agora_ap_processor_process_stream(processor, &mut near_frame, &mut far_frame),
            0
        );

        assert_eq!(agora_ap_processor_release(processor), 0);
        assert_eq!(
            agora_ap_processor_process_stream(processor, &mut near_frame, &mut far_frame),
            -2
        );
        // A null argument is reported before the handle is looked at.
        assert_eq!(
            agora_ap_processor_process_stream(processor, &mut near_frame, ptr::null_mut()),
            -1
        );
        assert_eq!(
            agora_ap_processor_process_stream(processor, ptr::null_mut(), &mut far_frame),
            -1
        );
        assert_eq!(
            agora_ap_processor_process_stream(foreign(), &mut near_frame, ptr::null_mut()),
            -1
        );
        agora_ap_service_release(service);
    }

    #[test]
    fn engine_calls_and_callbacks_flow_through() {
        let _serial = serial();
        let _factory = FactoryGuard::install(failing_streams);
        LOG.clear();
        CALLBACKS.lock().unwrap().clear();

        let strings = ServiceStrings::new("app", "/nonexistent");
        let service = initialized_service(&strings);
        let processor = agora_ap_processor_create(service, agora_ap_processor_config_create());
        assert!(!processor.is_null());
        LOG.clear();

        let mut near = vec![4i16; 160];
        let mut far = vec![5i16; 160];
        let mut near_frame = frame(&mut near, 16_000);
        let mut far_frame = frame(&mut far, 16_000);
        assert_eq!(
            agora_ap_processor_process_stream(processor, &mut near_frame, &mut far_frame),
            -22
        );

        assert_eq!(
            LOG.calls(),
            [
                Call::SetStreamDelayMs(60),
                Call::SetStreamAnalogLevel(0),
                Call::ProcessReverseStream {
                    samples: vec![5; 160]
                },
                Call::ProcessStream {
                    samples: vec![4; 160]
                },
            ]
        );
        assert_eq!(
            *CALLBACKS.lock().unwrap(),
            [
                ("error", processor as usize, -50),
                ("event", processor as usize, 0)
            ]
        );

        assert_eq!(agora_ap_processor_reset(processor), 0);
        assert_eq!(agora_ap_processor_release(processor), 0);
        agora_ap_service_release(service);
    }

    #[test]
    fn explicit_user_data_reaches_callbacks() {
        let _serial = serial();
        let _factory = FactoryGuard::install(failing_streams);
        CALLBACKS.lock().unwrap().clear();

        let strings = ServiceStrings::new("app", "/nonexistent");
        let service = initialized_service(&strings);
        let token = 0xBEEFusize as *mut c_void;
        let processor = agora_ap_processor_create_with_user_data(
            service,
            agora_ap_processor_config_create(),
            token,
        );
        assert_eq!(*CALLBACKS.lock().unwrap(), [("error", 0xBEEF, -50)]);
        assert_eq!(agora_ap_processor_release(processor), 0);
        agora_ap_service_release(service);
    }

    #[test]
    fn mute_reference_mode_accepts_null_reference() {
        let _serial = serial();
        let _factory = FactoryGuard::install(recording);
        let strings = ServiceStrings::new("app", "/nonexistent");
        let service = initialized_service(&strings);

        let mut config = agora_ap_processor_config_create();
        config.reference_mode = ReferenceMode::MuteWhenAecDisabled.as_i32();
        let processor = agora_ap_processor_create(service, config);
        LOG.clear();

        let mut near = vec![8i16; 480];
        let mut near_frame = frame(&mut near, 48_000);
        assert_eq!(
            agora_ap_processor_process_stream(processor, &mut near_frame, ptr::null_mut()),
            0
        );
        assert!(LOG.calls().contains(&Call::ProcessReverseStream {
            samples: vec![0; 480]
        }));

        assert_eq!(agora_ap_processor_release(processor), 0);
        agora_ap_service_release(service);
    }

    #[test]
    fn runtime_controls_reach_the_engine() {
        let _serial = serial();
        let strings = ServiceStrings::new("app", "/nonexistent");
        let service = initialized_service(&strings);
        let mut config = agora_ap_processor_config_create();
        config.aec_config.enabled = true;
        let processor = agora_ap_processor_create(service, config);

        assert_eq!(agora_ap_processor_set_stream_delay_ms(processor, 90), 0);
        assert!(agora_ap_processor_set_stream_delay_ms(processor, 10) < -1000);
        assert_eq!(agora_ap_processor_set_stream_analog_level(processor, 128), 0);
        assert_eq!(agora_ap_processor_set_gain(processor, 200), 0);

        let key = CString::new("che.audio.custom").unwrap();
        assert_eq!(
            agora_ap_processor_set_parameter(processor, key.as_ptr(), 3),
            0
        );
        assert_eq!(
            agora_ap_processor_set_parameter(processor, ptr::null(), 3),
            -1
        );

        let mut level = -1;
        assert_eq!(
            agora_ap_processor_get_stream_analog_level(processor, &mut level),
            0
        );
        assert_eq!(level, 128);
        assert_eq!(
            agora_ap_processor_get_stream_analog_level(processor, ptr::null_mut()),
            -1
        );

        let mut state = ApProcessorState::default();
        assert_eq!(agora_ap_processor_get_state(processor, 16_000, &mut state), 0);
        assert!(state.has_algorithm_latency_ms);
        assert!(state.has_aec_estimated_delay_ms);
        assert_eq!(state.aec_estimated_delay_ms, 90);

        let mut off = agora_ap_processor_config_create();
        off.aec_config.enabled = false;
        assert_eq!(agora_ap_processor_apply_config(processor, off), 0);
        assert_eq!(agora_ap_processor_get_state(processor, 16_000, &mut state), 0);
        assert!(!state.has_aec_estimated_delay_ms);

        assert_eq!(agora_ap_processor_release(processor), 0);
        agora_ap_service_release(service);
    }
}
