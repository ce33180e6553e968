#![no_main]

use std::ffi::CStr;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use uap3a::ffi::functions::*;
use uap3a::ffi::types::*;

/// Raw flat config fields, enum values unchecked.
#[derive(Debug, Arbitrary)]
struct FuzzConfig {
    flags: [bool; 8],
    aec: [i32; 5],
    ans: [i32; 3],
    agc: [i32; 3],
    bghvs: [i32; 4],
    reference_mode: i32,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    configs: Vec<FuzzConfig>,
    buf_len: u16,
}

impl FuzzConfig {
    fn to_ap(&self) -> ApProcessorConfig {
        let f = self.flags;
        ApProcessorConfig {
            aec_config: ApAecConfig {
                enabled: f[0],
                stereo_aec_enabled: f[1],
                enable_aec_auto_reset: f[2],
                aec_startup_max_suppress_time_ms: self.aec[0],
                filter_length: self.aec[1],
                aec_model_type: self.aec[2],
                ai_aec_suppression_mode: self.aec[3],
                aec_suppression_mode: self.aec[4],
            },
            ans_config: ApAnsConfig {
                enabled: f[3],
                suppression_mode: self.ans[0],
                ans_model_type: self.ans[1],
                speech_protect_threshold: self.ans[2],
            },
            agc_config: ApAgcConfig {
                enabled: f[4],
                use_analog_mode: f[5],
                max_digital_gain_db: self.agc[0],
                target_level_db: self.agc[1],
                curve_slope: self.agc[2],
            },
            bghvs_config: ApBghvsConfig {
                enabled: f[6],
                sos_len_ms: self.bghvs[0],
                eos_len_ms: self.bghvs[1],
                suppression_mode: self.bghvs[2],
                delay_frames: self.bghvs[3],
            },
            reference_mode: self.reference_mode,
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    if input.configs.is_empty() {
        return;
    }

    let service = agora_ap_service_create();
    let app_id = c"fuzz";
    let license = c"license";
    let resource = c"/nonexistent/";
    let service_config = ApServiceConfig {
        app_id: app_id.as_ptr(),
        license: license.as_ptr(),
        resource_path: resource.as_ptr(),
    };
    let _ = agora_ap_service_initialize(service, &service_config, std::ptr::null());

    let processor = agora_ap_processor_create(service, agora_ap_processor_config_create());
    assert!(!processor.is_null());

    let mut buf = vec![0 as std::ffi::c_char; usize::from(input.buf_len)];
    for config in &input.configs {
        let config = config.to_ap();

        let needed = agora_ap_processor_config_get_message(&config, std::ptr::null_mut(), 0);
        let written = agora_ap_processor_config_get_message(&config, buf.as_mut_ptr(), buf.len());
        assert_eq!(needed, written);
        if written >= 0 && !buf.is_empty() {
            // Always NUL-terminated within the buffer.
            let text = unsafe { CStr::from_ptr(buf.as_ptr()) };
            assert!(text.to_bytes().len() < buf.len());
        }

        // Only the reference mode is checked here; engine enums pass through
        // and any refusal comes back as the engine's own status.
        let known_mode = matches!(config.reference_mode, 0 | 1);
        assert_eq!(written == -4, !known_mode);
        let status = agora_ap_processor_apply_config(processor, config);
        assert_eq!(status == -4, !known_mode);
    }

    assert_eq!(agora_ap_processor_release(processor), 0);
    agora_ap_service_release(service);
});
