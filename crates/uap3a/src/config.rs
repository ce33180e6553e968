//! Engine-native processor configuration.
//!
//! Every field is an `Option`: `None` leaves the engine's own default in
//! place, `Some(...)` overrides it. The engine is the only validator of
//! numeric ranges.

use std::fmt;

/// Error produced while mapping a flat configuration.
///
/// Engine enums never fail to map; only settings this crate interprets
/// itself, such as the reference mode, are checked here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// An integer field does not name a known variant.
    UnknownVariant { field: &'static str, value: i32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UnknownVariant { field, value } => {
                write!(f, "unknown value {value} for `{field}`")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Declares an `i32`-backed engine enum.
///
/// Values the crate does not know map to `Unknown` and reach the engine
/// unchanged; the engine decides whether they are valid.
macro_rules! engine_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
            /// A value outside the known set, forwarded as is.
            Unknown(i32),
        }

        impl $name {
            /// Returns the engine's integer value.
            pub const fn as_i32(self) -> i32 {
                match self {
                    $(Self::$variant => $value,)+
                    Self::Unknown(value) => value,
                }
            }

            /// Maps an engine integer value; never fails.
            pub const fn from_i32(value: i32) -> Self {
                match value {
                    $($value => Self::$variant,)+
                    other => Self::Unknown(other),
                }
            }

            pub const fn is_known(self) -> bool {
                !matches!(self, Self::Unknown(_))
            }
        }
    };
}

engine_enum! {
    /// AEC linear filter length.
    AecFilterLength {
        /// 48 ms, for normal rooms.
        Normal = 0,
        /// 200 ms, for reverberant rooms.
        Long = 1,
        /// 480 ms, for highly reverberant rooms.
        Longest = 2,
    }
}

engine_enum! {
    /// Echo cancellation algorithm.
    AecModelType {
        /// Traditional linear AEC.
        TraditionalAec = 0,
        /// Low-latency AI AEC (`ainlp_ll` model).
        LowLatencyAiAec = 1,
        /// Standard-latency AI AEC (`ainlp` model).
        StandardAiAec = 2,
    }
}

engine_enum! {
    /// AI AEC suppression mode.
    AiAecSuppressionMode {
        /// Aggressive suppression for conversation.
        Chat = 0,
        /// Mild suppression for singing.
        Sing = 1,
        /// Very mild suppression for singing.
        SuperSing = 2,
        /// Minimal suppression for singing.
        PerfectSing = 3,
    }
}

engine_enum! {
    /// Traditional AEC suppression level.
    AecSuppressionMode {
        Mild = 0,
        Normal = 1,
        Aggressive = 2,
        SuperAggressive = 3,
        Extreme = 4,
    }
}

engine_enum! {
    /// Noise suppression level.
    AnsSuppressionMode {
        Mild = 0,
        Moderate = 1,
        Aggressive = 2,
        Extreme = 3,
    }
}

engine_enum! {
    /// Noise suppression algorithm.
    AnsModelType {
        /// Traditional noise suppression.
        TraditionalAns = 0,
        /// Low-latency AI noise suppression (`ains_ll` model).
        LowLatencyAiAns = 1,
        /// Standard-latency AI noise suppression (`ains` model).
        StandardAiAns = 2,
    }
}

engine_enum! {
    /// BGHVS aggressiveness.
    BghvsSuppressionMode {
        Mild = 0,
        Moderate = 1,
        Aggressive = 2,
    }
}

/// Upper bound of `aec_startup_max_suppress_time_ms`, also its default.
pub const MAX_STARTUP_SUPPRESS_TIME_MS: i32 = (1 << 30) - 1;

/// Acoustic echo cancellation settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AecConfig {
    pub enabled: Option<bool>,
    pub stereo_aec_enabled: Option<bool>,
    /// Reset AEC automatically when it becomes unavailable.
    pub enable_aec_auto_reset: Option<bool>,
    /// Longest period of extreme suppression while AEC converges, in ms.
    /// Range `0..=MAX_STARTUP_SUPPRESS_TIME_MS`.
    pub aec_startup_max_suppress_time_ms: Option<i32>,
    pub filter_length: Option<AecFilterLength>,
    pub aec_model_type: Option<AecModelType>,
    pub aec_suppression_mode: Option<AecSuppressionMode>,
    pub ai_aec_suppression_mode: Option<AiAecSuppressionMode>,
}

/// Noise suppression settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnsConfig {
    pub enabled: Option<bool>,
    pub suppression_mode: Option<AnsSuppressionMode>,
    pub ans_model_type: Option<AnsModelType>,
    /// Speech protection threshold in `0..=100`. 100 disables protection;
    /// 50 is recommended when speech damage is a concern.
    pub speech_protect_threshold: Option<i32>,
}

/// Automatic gain control settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgcConfig {
    pub enabled: Option<bool>,
    /// Drive the capture device's analog volume instead of digital gain.
    pub use_analog_mode: Option<bool>,
    /// Maximum digital gain in dB, recommended `6..=30`.
    pub max_digital_gain_db: Option<i32>,
    /// Target level in dB below full scale, recommended `0..=18`.
    pub target_level_db: Option<i32>,
    /// Compression curve slope, recommended `3..=30`.
    pub curve_slope: Option<i32>,
}

/// Background human voice suppression and session control settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BghvsConfig {
    pub enabled: Option<bool>,
    /// Speech duration that opens a session, in ms.
    pub sos_len_ms: Option<i32>,
    /// Silence duration that closes a session, in ms.
    pub eos_len_ms: Option<i32>,
    pub suppression_mode: Option<BghvsSuppressionMode>,
    /// Algorithm delay in 10 ms frames.
    pub delay_frames: Option<i32>,
}

/// Complete processor configuration.
///
/// `Default` leaves every field unset. Use [`ProcessorConfig::recommended`]
/// for the baseline handed out by the C API.
///
/// # Example
///
/// ```
/// use uap3a::config::{AecConfig, ProcessorConfig};
///
/// let config = ProcessorConfig {
///     aec: AecConfig {
///         enabled: Some(true),
///         ..ProcessorConfig::recommended().aec
///     },
///     ..ProcessorConfig::recommended()
/// };
/// assert_eq!(config.ans.enabled, Some(true));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorConfig {
    pub aec: AecConfig,
    pub ans: AnsConfig,
    pub agc: AgcConfig,
    pub bghvs: BghvsConfig,
}

impl ProcessorConfig {
    /// Conservative baseline: AEC off, ANS on (moderate), AGC off, BGHVS on
    /// (moderate).
    ///
    /// This is the single source of default values; it does not ask the
    /// engine.
    pub const fn recommended() -> Self {
        Self {
            aec: AecConfig {
                enabled: Some(false),
                stereo_aec_enabled: Some(false),
                enable_aec_auto_reset: Some(false),
                aec_startup_max_suppress_time_ms: Some(MAX_STARTUP_SUPPRESS_TIME_MS),
                filter_length: Some(AecFilterLength::Normal),
                aec_model_type: Some(AecModelType::LowLatencyAiAec),
                aec_suppression_mode: Some(AecSuppressionMode::Aggressive),
                ai_aec_suppression_mode: Some(AiAecSuppressionMode::Chat),
            },
            ans: AnsConfig {
                enabled: Some(true),
                suppression_mode: Some(AnsSuppressionMode::Moderate),
                ans_model_type: Some(AnsModelType::StandardAiAns),
                speech_protect_threshold: Some(100),
            },
            agc: AgcConfig {
                enabled: Some(false),
                use_analog_mode: Some(false),
                max_digital_gain_db: Some(12),
                target_level_db: Some(6),
                curve_slope: Some(17),
            },
            bghvs: BghvsConfig {
                enabled: Some(true),
                sos_len_ms: Some(160),
                eos_len_ms: Some(500),
                suppression_mode: Some(BghvsSuppressionMode::Moderate),
                delay_frames: Some(12),
            },
        }
    }

    /// Whether this configuration turns echo cancellation on.
    pub fn aec_enabled(&self) -> bool {
        self.aec.enabled == Some(true)
    }
}

/// Formats an optional field, printing `-` when unset.
struct Opt<T>(Option<T>);

impl<T: fmt::Debug> fmt::Display for Opt<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => write!(f, "{value:?}"),
            None => f.write_str("-"),
        }
    }
}

impl fmt::Display for ProcessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            aec,
            ans,
            agc,
            bghvs,
        } = self;
        writeln!(
            f,
            "aec: enabled={} stereo={} auto_reset={} startup_max_suppress_ms={} filter_length={} model={} suppression={} ai_suppression={}",
            Opt(aec.enabled),
            Opt(aec.stereo_aec_enabled),
            Opt(aec.enable_aec_auto_reset),
            Opt(aec.aec_startup_max_suppress_time_ms),
            Opt(aec.filter_length),
            Opt(aec.aec_model_type),
            Opt(aec.aec_suppression_mode),
            Opt(aec.ai_aec_suppression_mode),
        )?;
        writeln!(
            f,
            "ans: enabled={} suppression={} model={} speech_protect_threshold={}",
            Opt(ans.enabled),
            Opt(ans.suppression_mode),
            Opt(ans.ans_model_type),
            Opt(ans.speech_protect_threshold),
        )?;
        writeln!(
            f,
            "agc: enabled={} analog={} max_digital_gain_db={} target_level_db={} curve_slope={}",
            Opt(agc.enabled),
            Opt(agc.use_analog_mode),
            Opt(agc.max_digital_gain_db),
            Opt(agc.target_level_db),
            Opt(agc.curve_slope),
        )?;
        write!(
            f,
            "bghvs: enabled={} sos_ms={} eos_ms={} suppression={} delay_frames={}",
            Opt(bghvs.enabled),
            Opt(bghvs.sos_len_ms),
            Opt(bghvs.eos_len_ms),
            Opt(bghvs.suppression_mode),
            Opt(bghvs.delay_frames),
        )
    }
}
