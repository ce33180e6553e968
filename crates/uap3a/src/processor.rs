//! Per-stream processing handle.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ProcessorConfig;
use crate::engine::{AudioProcessingEngine, Credentials, DumpOption, EngineState};
use crate::error::Error;
use crate::events::EventSink;
use crate::frame::{AudioFrame, MuteFrame};
use crate::models::AiModelResourceConfig;

/// Dump directory used when none is configured.
pub const DEFAULT_DUMP_DIR: &str = "./dump/";

/// Stream delay applied before every frame unless overridden.
pub const DEFAULT_STREAM_DELAY_MS: i32 = 60;

/// Analog level applied before every frame unless overridden.
pub const DEFAULT_ANALOG_LEVEL: i32 = 0;

/// Which far-end signal is fed to the reverse stream.
#[repr(i32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReferenceMode {
    /// The caller's reference frame is required and always forwarded.
    #[default]
    PassThrough = 0,
    /// Silence replaces the reference while AEC is disabled or when the
    /// caller supplies none.
    MuteWhenAecDisabled = 1,
}

impl ReferenceMode {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::PassThrough),
            1 => Some(Self::MuteWhenAecDisabled),
            _ => None,
        }
    }
}

/// Construction options that are not engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorOptions {
    /// Where the engine dumps diagnostic data. `None` disables dumping.
    pub dump_dir: Option<PathBuf>,
    pub reference_mode: ReferenceMode,
    pub stream_delay_ms: i32,
    pub analog_level: i32,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            dump_dir: Some(PathBuf::from(DEFAULT_DUMP_DIR)),
            reference_mode: ReferenceMode::default(),
            stream_delay_ms: DEFAULT_STREAM_DELAY_MS,
            analog_level: DEFAULT_ANALOG_LEVEL,
        }
    }
}

/// One engine instance and the state needed to drive it frame by frame.
///
/// A processor is independent of the [`Service`](crate::Service) that
/// created it: it holds its own clones of the credentials and model buffers.
/// Dropping it releases the engine.
///
/// Not thread-safe per handle; calls must be serialized by the owner.
#[derive(derive_more::Debug)]
pub struct Processor {
    #[debug(skip)]
    engine: Option<Box<dyn AudioProcessingEngine>>,
    #[debug(skip)]
    events: Option<Arc<dyn EventSink>>,
    credentials: Credentials,
    // Kept alive for as long as the engine may read them.
    #[debug(skip)]
    models: [AiModelResourceConfig; 4],
    aec_enabled: bool,
    reference_mode: ReferenceMode,
    stream_delay_ms: i32,
    analog_level: i32,
    mute: Option<MuteFrame>,
}

impl Processor {
    /// Brings `engine` up: init, models, configuration, then data dump.
    ///
    /// Failures along the way are logged and do not abort construction; the
    /// engine reports licensing problems through `events` as well.
    pub(crate) fn new(
        mut engine: Box<dyn AudioProcessingEngine>,
        events: Arc<dyn EventSink>,
        credentials: Credentials,
        models: [AiModelResourceConfig; 4],
        config: &ProcessorConfig,
        options: ProcessorOptions,
    ) -> Self {
        if let Err(err) = engine.init(&credentials, Arc::clone(&events)) {
            tracing::warn!(%err, "engine init failed");
        }

        for model in &models {
            if let Err(err) = engine.set_ai_model_resource(model) {
                tracing::warn!(model = ?model.model_name, %err, "engine rejected model");
            }
        }

        for (section, status) in [
            ("aec", engine.set_aec_configuration(&config.aec)),
            ("ans", engine.set_ans_configuration(&config.ans)),
            ("agc", engine.set_agc_configuration(&config.agc)),
            ("bghvs", engine.set_bghvs_configuration(&config.bghvs)),
        ] {
            if let Err(err) = status {
                tracing::warn!(section, %err, "engine rejected configuration");
            }
        }

        if let Some(dir) = &options.dump_dir {
            if let Err(err) = engine.enable_data_dump(&DumpOption::enabled_at(dir)) {
                tracing::warn!(dir = %dir.display(), %err, "failed to enable data dump");
            }
        }

        tracing::info!(
            aec_enabled = config.aec_enabled(),
            reference_mode = ?options.reference_mode,
            "processor created"
        );

        Self {
            engine: Some(engine),
            events: Some(events),
            credentials,
            models,
            aec_enabled: config.aec_enabled(),
            reference_mode: options.reference_mode,
            stream_delay_ms: options.stream_delay_ms,
            analog_level: options.analog_level,
            mute: None,
        }
    }

    fn engine(&mut self) -> Result<&mut (dyn AudioProcessingEngine + 'static), Error> {
        self.engine.as_deref_mut().ok_or(Error::Released)
    }

    fn engine_ref(&self) -> Result<&dyn AudioProcessingEngine, Error> {
        self.engine.as_deref().ok_or(Error::Released)
    }

    pub fn is_released(&self) -> bool {
        self.engine.is_none()
    }

    pub fn reference_mode(&self) -> ReferenceMode {
        self.reference_mode
    }

    pub fn set_reference_mode(&mut self, mode: ReferenceMode) {
        self.reference_mode = mode;
    }

    pub fn aec_enabled(&self) -> bool {
        self.aec_enabled
    }

    pub fn app_id(&self) -> &str {
        &self.credentials.app_id
    }

    /// Number of model slots that hold data.
    pub fn loaded_models(&self) -> usize {
        self.models.iter().filter(|model| !model.is_empty()).count()
    }

    /// Applies AEC, ANS, AGC and BGHVS settings in that order.
    ///
    /// Stops at the first engine failure and returns it unchanged; sections
    /// applied before the failure stay in effect.
    pub fn apply_config(&mut self, config: &ProcessorConfig) -> Result<(), Error> {
        let engine = self.engine()?;
        engine.set_aec_configuration(&config.aec)?;
        self.aec_enabled = config.aec_enabled();
        let engine = self.engine()?;
        engine.set_ans_configuration(&config.ans)?;
        engine.set_agc_configuration(&config.agc)?;
        engine.set_bghvs_configuration(&config.bghvs)?;
        tracing::debug!(aec_enabled = self.aec_enabled, "processor reconfigured");
        Ok(())
    }

    /// Processes one 10 ms near-end frame in place.
    ///
    /// The reference frame (or silence, see [`ReferenceMode`]) goes through
    /// the reverse stream first. Its status is only logged; the forward
    /// stream's status is returned.
    pub fn process_stream(
        &mut self,
        frame: &mut AudioFrame<'_>,
        reference: Option<&mut AudioFrame<'_>>,
    ) -> Result<(), Error> {
        let engine = self.engine.as_deref_mut().ok_or(Error::Released)?;
        let reference = match (self.reference_mode, reference) {
            (ReferenceMode::PassThrough, None) => return Err(Error::MissingReference),
            (ReferenceMode::PassThrough, Some(reference)) => Some(reference),
            (ReferenceMode::MuteWhenAecDisabled, reference) => {
                reference.filter(|_| self.aec_enabled)
            }
        };

        if let Err(err) = engine.set_stream_delay_ms(self.stream_delay_ms) {
            tracing::trace!(delay_ms = self.stream_delay_ms, %err, "stream delay rejected");
        }
        if let Err(err) = engine.set_stream_analog_level(self.analog_level) {
            tracing::trace!(level = self.analog_level, %err, "analog level rejected");
        }

        let reverse_status = match reference {
            Some(reference) => engine.process_reverse_stream(reference),
            None => {
                let mute = self.mute.get_or_insert_with(MuteFrame::default);
                engine.process_reverse_stream(&mut mute.frame(frame.format()))
            }
        };
        if let Err(err) = reverse_status {
            tracing::debug!(%err, "reverse stream failed");
        }

        engine.process_stream(frame)?;
        Ok(())
    }

    /// Replaces the stream delay applied before every frame.
    pub fn set_stream_delay_ms(&mut self, delay_ms: i32) -> Result<(), Error> {
        self.engine()?.set_stream_delay_ms(delay_ms)?;
        self.stream_delay_ms = delay_ms;
        Ok(())
    }

    /// Replaces the analog level applied before every frame.
    pub fn set_stream_analog_level(&mut self, level: i32) -> Result<(), Error> {
        self.engine()?.set_stream_analog_level(level)?;
        self.analog_level = level;
        Ok(())
    }

    /// Analog level recommended by AGC after the last frame.
    pub fn stream_analog_level(&self) -> Result<i32, Error> {
        Ok(self.engine_ref()?.stream_analog_level()?)
    }

    pub fn set_gain(&mut self, gain: i32) -> Result<(), Error> {
        Ok(self.engine()?.set_gain(gain)?)
    }

    pub fn set_parameter(&mut self, key: &str, value: i32) -> Result<(), Error> {
        Ok(self.engine()?.set_parameter(key, value)?)
    }

    pub fn state(&self, sample_rate_hz: u32) -> Result<EngineState, Error> {
        Ok(self.engine_ref()?.state(sample_rate_hz)?)
    }

    /// Starts or stops the BGHVS-only data dump.
    ///
    /// Independent of the main dump configured at construction.
    pub fn enable_bghvs_data_dump(&mut self, option: &DumpOption) -> Result<(), Error> {
        Ok(self.engine()?.enable_bghvs_data_dump(option)?)
    }

    pub fn sdk_version(&self) -> Result<&'static str, Error> {
        Ok(self.engine_ref()?.sdk_version())
    }

    /// Resets the engine, typically after an
    /// [`AecMalfunction`](crate::EngineEvent::AecMalfunction) event.
    pub fn reset(&mut self) -> Result<(), Error> {
        Ok(self.engine()?.reset()?)
    }

    /// Releases the engine, the event sink and the mute frame.
    ///
    /// Returns [`Error::Released`] if this was already done.
    pub fn release(&mut self) -> Result<(), Error> {
        let mut engine = self.engine.take().ok_or(Error::Released)?;
        engine.release();
        drop(engine);
        // The engine dropped its clone of the sink; ours goes last.
        drop(self.events.take());
        self.mute = None;
        tracing::info!("processor released");
        Ok(())
    }
}

impl Drop for Processor {
    fn drop(&mut self) {
        if !self.is_released() {
            let _ = self.release();
        }
    }
}
