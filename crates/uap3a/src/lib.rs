//! Session control for an uplink 3A audio processing engine.
//!
//! Wraps an external engine providing echo cancellation (AEC), noise
//! suppression (ANS), automatic gain control (AGC) and background human
//! voice suppression (BGHVS). This crate owns the handle lifecycle,
//! configuration mapping, model loading, event delivery and per-frame
//! forwarding; the signal processing itself happens behind
//! [`AudioProcessingEngine`].
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use uap3a::{
//!     AudioFrame, FrameFormat, LogSink, LoopbackEngine, ProcessorConfig, ProcessorOptions,
//!     Service, ServiceConfig,
//! };
//!
//! let service = Service::initialize(ServiceConfig::new("app-id", "license", "./resource"));
//! let mut processor = service.create_processor(
//!     Box::new(LoopbackEngine::new()),
//!     Arc::new(LogSink),
//!     &ProcessorConfig::recommended(),
//!     ProcessorOptions {
//!         dump_dir: None,
//!         ..ProcessorOptions::default()
//!     },
//! );
//!
//! let format = FrameFormat::new(16_000, 1).unwrap();
//! let mut near = vec![0i16; format.num_samples()];
//! let mut far = vec![0i16; format.num_samples()];
//!
//! // For each 10 ms frame:
//! let mut frame = AudioFrame::new(format, &mut near).unwrap();
//! let mut reference = AudioFrame::new(format, &mut far).unwrap();
//! processor.process_stream(&mut frame, Some(&mut reference)).unwrap();
//! ```
//!
//! The `ffi` feature adds the C API (`agora_ap_*`), which keeps a single
//! process-wide service.

pub mod config;
pub mod engine;
mod error;
pub mod events;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod frame;
pub mod models;
mod processor;
mod service;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Public re-exports.
pub use config::{ConfigError, ProcessorConfig};
pub use engine::{AudioProcessingEngine, Credentials, DumpOption, EngineState, LoopbackEngine};
pub use error::{EngineError, Error};
pub use events::{EngineEvent, EventSink, LogSink, SilentSink};
pub use frame::{AudioFrame, FrameError, FrameFormat, FrameHeader};
pub use models::{ModelKind, ModelResource, ModelSet};
pub use processor::{
    DEFAULT_ANALOG_LEVEL, DEFAULT_DUMP_DIR, DEFAULT_STREAM_DELAY_MS, Processor, ProcessorOptions,
    ReferenceMode,
};
pub use service::{Service, ServiceConfig, normalize_resource_path};
