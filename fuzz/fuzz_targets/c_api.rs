#![no_main]

use std::ffi::{CString, c_void};
use std::ptr;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use uap3a::ffi::functions::*;
use uap3a::ffi::types::*;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    sample_rate_idx: u8,
    channels: u8,
    /// Lies about frame type, sample width and rate when set. The samples
    /// per channel always match the buffers, so a header that passes
    /// validation never claims more samples than they hold.
    bogus_header: Option<(i32, i32, i32)>,
    reference_mode: i32,
    operations: Vec<FuzzOp>,
    samples: Vec<i16>,
}

#[derive(Debug, Arbitrary)]
enum FuzzOp {
    Process { with_reference: bool },
    ProcessInPlace,
    ApplyConfig { aec: bool, ans: bool, agc: bool, bghvs: bool, reference_mode: i32 },
    SetDelay(i32),
    SetAnalogLevel(i32),
    GetAnalogLevel,
    SetGain(i32),
    SetParameter(String, i32),
    GetState(u32),
    Reset,
    Release,
    ReleaseService,
}

fn sample_rate(idx: u8) -> i32 {
    match idx % 6 {
        0 => 8000,
        1 => 16000,
        2 => 24000,
        3 => 32000,
        4 => 44100,
        _ => 48000,
    }
}

fuzz_target!(|input: FuzzInput| {
    let rate = sample_rate(input.sample_rate_idx);
    let channels = i32::from(input.channels % 2) + 1;
    let total = (rate / 100 * channels) as usize;

    if input.samples.len() < total {
        return;
    }

    let service = agora_ap_service_create();
    let app_id = CString::new("fuzz").unwrap();
    let license = CString::new("license").unwrap();
    let resource = CString::new("/nonexistent/").unwrap();
    let service_config = ApServiceConfig {
        app_id: app_id.as_ptr(),
        license: license.as_ptr(),
        resource_path: resource.as_ptr(),
    };
    let _ = agora_ap_service_initialize(service, &service_config, ptr::null());

    let mut config = agora_ap_processor_config_create();
    config.reference_mode = input.reference_mode;
    let processor = agora_ap_processor_create(service, config);
    if processor.is_null() {
        agora_ap_service_release(service);
        return;
    }

    let mut near = input.samples[..total].to_vec();
    let mut far = input.samples[..total].to_vec();
    let samples_per_channel = rate / 100;
    let (frame_type, bytes_per_sample, layout_rate) =
        input.bogus_header.unwrap_or((0, 2, rate));
    let header = |buffer: *mut c_void| ApAudioFrame {
        frame_type,
        sample_rate: layout_rate,
        channels,
        samples_per_channel,
        bytes_per_sample,
        buffer,
    };

    let mut released = false;
    for op in &input.operations {
        if released {
            // The handle stays rejected whatever comes after.
            assert_eq!(agora_ap_processor_set_gain(processor, 100), -2);
        }
        match op {
            FuzzOp::Process { with_reference } => {
                let mut frame = header(near.as_mut_ptr().cast());
                let mut reference = header(far.as_mut_ptr().cast());
                let reference = if *with_reference {
                    &raw mut reference
                } else {
                    ptr::null_mut()
                };
                let _ = agora_ap_processor_process_stream(processor, &mut frame, reference);
            }
            FuzzOp::ProcessInPlace => {
                let mut frame = header(near.as_mut_ptr().cast());
                let mut alias = header(near.as_mut_ptr().cast());
                let _ = agora_ap_processor_process_stream(processor, &mut frame, &mut alias);
            }
            FuzzOp::ApplyConfig { aec, ans, agc, bghvs, reference_mode } => {
                let mut config = agora_ap_processor_config_create();
                config.aec_config.enabled = *aec;
                config.ans_config.enabled = *ans;
                config.agc_config.enabled = *agc;
                config.bghvs_config.enabled = *bghvs;
                config.reference_mode = *reference_mode;
                let _ = agora_ap_processor_apply_config(processor, config);
            }
            FuzzOp::SetDelay(delay) => {
                let _ = agora_ap_processor_set_stream_delay_ms(processor, *delay);
            }
            FuzzOp::SetAnalogLevel(level) => {
                let _ = agora_ap_processor_set_stream_analog_level(processor, *level);
            }
            FuzzOp::GetAnalogLevel => {
                let mut level = 0;
                let _ = agora_ap_processor_get_stream_analog_level(processor, &mut level);
            }
            FuzzOp::SetGain(gain) => {
                let _ = agora_ap_processor_set_gain(processor, *gain);
            }
            FuzzOp::SetParameter(key, value) => {
                if let Ok(key) = CString::new(key.as_str()) {
                    let _ = agora_ap_processor_set_parameter(processor, key.as_ptr(), *value);
                }
            }
            FuzzOp::GetState(rate) => {
                let mut state = ApProcessorState::default();
                let _ = agora_ap_processor_get_state(processor, *rate, &mut state);
            }
            FuzzOp::Reset => {
                let _ = agora_ap_processor_reset(processor);
            }
            FuzzOp::Release => {
                let expected = if released { -2 } else { 0 };
                assert_eq!(agora_ap_processor_release(processor), expected);
                released = true;
            }
            FuzzOp::ReleaseService => {
                agora_ap_service_release(service);
            }
        }
    }

    if !released {
        assert_eq!(agora_ap_processor_release(processor), 0);
    }
    assert_eq!(agora_ap_processor_release(processor), -2);
    agora_ap_service_release(service);
});
