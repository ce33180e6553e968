//! 10 ms audio frames and their boundary validation.
//!
//! Frames cross the C boundary as a fixed-layout record (see
//! [`FRAME_LAYOUT_VERSION`]). The record's header is checked with
//! [`FrameHeader::validate`] before any sample is touched, and the sample
//! buffer is then exposed to the engine as a typed [`AudioFrame`].

use std::fmt;

/// Version of the C frame record layout.
///
/// Field order: `type`, `sampleRate`, `channels`, `samplesPerChannel`,
/// `bytesPerSample` (all 32-bit signed), then the buffer pointer.
pub const FRAME_LAYOUT_VERSION: u32 = 1;

/// Sample rates accepted by the engine.
pub const SUPPORTED_SAMPLE_RATES_HZ: [u32; 6] = [8_000, 16_000, 24_000, 32_000, 44_100, 48_000];

/// Maximum number of interleaved channels.
pub const MAX_CHANNELS: u16 = 2;

/// Bytes per sample of [`FrameType::Pcm16`].
pub const PCM16_BYTES_PER_SAMPLE: i32 = 2;

/// Sample encoding of a frame.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Interleaved signed 16-bit PCM.
    Pcm16 = 0,
}

/// Error returned when a frame record does not describe a valid frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    UnsupportedFrameType { frame_type: i32 },
    UnsupportedBytesPerSample { bytes_per_sample: i32 },
    UnsupportedSampleRate { sample_rate_hz: i32 },
    UnsupportedChannels { channels: i32 },
    /// `samplesPerChannel` is not a 10 ms chunk at the frame's rate.
    SamplesPerChannelMismatch { expected: usize, actual: i32 },
    /// The sample slice does not hold `channels * samplesPerChannel` samples.
    BufferLength { expected: usize, actual: usize },
    NullBuffer,
    /// The buffer is not aligned for 16-bit samples.
    MisalignedBuffer,
    /// The reference frame overlaps the capture frame's buffer.
    SharedBuffer,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UnsupportedFrameType { frame_type } => {
                write!(f, "unsupported frame type {frame_type}")
            }
            Self::UnsupportedBytesPerSample { bytes_per_sample } => write!(
                f,
                "unsupported bytes per sample {bytes_per_sample}; expected {PCM16_BYTES_PER_SAMPLE}"
            ),
            Self::UnsupportedSampleRate { sample_rate_hz } => write!(
                f,
                "unsupported sample rate {sample_rate_hz}; expected one of {SUPPORTED_SAMPLE_RATES_HZ:?}"
            ),
            Self::UnsupportedChannels { channels } => {
                write!(f, "unsupported channel count {channels}; expected 1..={MAX_CHANNELS}")
            }
            Self::SamplesPerChannelMismatch { expected, actual } => write!(
                f,
                "samples per channel is {actual}, a 10ms frame needs {expected}"
            ),
            Self::BufferLength { expected, actual } => {
                write!(f, "buffer holds {actual} samples, expected {expected}")
            }
            Self::NullBuffer => write!(f, "frame buffer is null"),
            Self::MisalignedBuffer => write!(f, "frame buffer is not aligned for 16-bit samples"),
            Self::SharedBuffer => write!(f, "reference frame shares the capture buffer"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Validated sample rate and channel count of a 10 ms frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameFormat {
    sample_rate_hz: u32,
    num_channels: u16,
}

impl FrameFormat {
    /// Create a validated frame format.
    pub fn new(sample_rate_hz: i32, num_channels: i32) -> Result<Self, FrameError> {
        let rate = u32::try_from(sample_rate_hz)
            .ok()
            .filter(|rate| SUPPORTED_SAMPLE_RATES_HZ.contains(rate))
            .ok_or(FrameError::UnsupportedSampleRate { sample_rate_hz })?;
        let channels = u16::try_from(num_channels)
            .ok()
            .filter(|channels| (1..=MAX_CHANNELS).contains(channels))
            .ok_or(FrameError::UnsupportedChannels {
                channels: num_channels,
            })?;
        Ok(Self {
            sample_rate_hz: rate,
            num_channels: channels,
        })
    }

    /// The sampling rate in Hz.
    #[inline]
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// The number of interleaved channels.
    #[inline]
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Samples per channel in one 10 ms frame.
    #[inline]
    pub fn samples_per_channel(&self) -> usize {
        self.sample_rate_hz as usize / 100
    }

    /// Total number of interleaved samples.
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.num_channels as usize * self.samples_per_channel()
    }
}

/// The scalar fields of a frame record, before the buffer is looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_type: i32,
    pub sample_rate_hz: i32,
    pub channels: i32,
    pub samples_per_channel: i32,
    pub bytes_per_sample: i32,
}

impl FrameHeader {
    /// Checks the header against the supported layout.
    pub fn validate(&self) -> Result<FrameFormat, FrameError> {
        if self.frame_type != FrameType::Pcm16 as i32 {
            return Err(FrameError::UnsupportedFrameType {
                frame_type: self.frame_type,
            });
        }
        if self.bytes_per_sample != PCM16_BYTES_PER_SAMPLE {
            return Err(FrameError::UnsupportedBytesPerSample {
                bytes_per_sample: self.bytes_per_sample,
            });
        }
        let format = FrameFormat::new(self.sample_rate_hz, self.channels)?;
        if usize::try_from(self.samples_per_channel).ok() != Some(format.samples_per_channel()) {
            return Err(FrameError::SamplesPerChannelMismatch {
                expected: format.samples_per_channel(),
                actual: self.samples_per_channel,
            });
        }
        Ok(format)
    }
}

impl From<FrameFormat> for FrameHeader {
    fn from(format: FrameFormat) -> Self {
        Self {
            frame_type: FrameType::Pcm16 as i32,
            sample_rate_hz: format.sample_rate_hz as i32,
            channels: i32::from(format.num_channels),
            samples_per_channel: format.samples_per_channel() as i32,
            bytes_per_sample: PCM16_BYTES_PER_SAMPLE,
        }
    }
}

/// A 10 ms block of interleaved PCM16 audio borrowed from the caller.
#[derive(Debug)]
pub struct AudioFrame<'a> {
    format: FrameFormat,
    samples: &'a mut [i16],
}

impl<'a> AudioFrame<'a> {
    /// Wraps `samples`, which must hold exactly one 10 ms frame.
    pub fn new(format: FrameFormat, samples: &'a mut [i16]) -> Result<Self, FrameError> {
        if samples.len() != format.num_samples() {
            return Err(FrameError::BufferLength {
                expected: format.num_samples(),
                actual: samples.len(),
            });
        }
        Ok(Self { format, samples })
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn samples(&self) -> &[i16] {
        self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [i16] {
        self.samples
    }
}

/// Lazily sized silent frame used as a substitute reference signal.
#[derive(derive_more::Debug, Default)]
pub(crate) struct MuteFrame {
    format: Option<FrameFormat>,
    #[debug(skip)]
    samples: Vec<i16>,
}

impl MuteFrame {
    /// Returns a silent frame in `format`, reallocating only when the
    /// format changes.
    pub(crate) fn frame(&mut self, format: FrameFormat) -> AudioFrame<'_> {
        if self.format != Some(format) {
            tracing::debug!(
                sample_rate_hz = format.sample_rate_hz(),
                channels = format.num_channels(),
                "allocating mute reference frame"
            );
            self.samples = vec![0; format.num_samples()];
            self.format = Some(format);
        } else {
            // The engine may have written into the previous frame.
            self.samples.fill(0);
        }
        AudioFrame {
            format,
            samples: &mut self.samples,
        }
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.samples.capacity()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_strategy::proptest;

    use super::*;

    fn header(rate: i32, channels: i32, samples_per_channel: i32) -> FrameHeader {
        FrameHeader {
            frame_type: 0,
            sample_rate_hz: rate,
            channels,
            samples_per_channel,
            bytes_per_sample: 2,
        }
    }

    #[test]
    fn accepts_every_supported_rate() {
        for rate in SUPPORTED_SAMPLE_RATES_HZ {
            let format = header(rate as i32, 2, rate as i32 / 100).validate().unwrap();
            assert_eq!(format.sample_rate_hz(), rate);
            assert_eq!(format.num_samples(), 2 * rate as usize / 100);
        }
    }

    #[test]
    fn rejects_44_1k_rounded_frame() {
        let err = header(44_100, 1, 440).validate().unwrap_err();
        assert_eq!(
            err,
            FrameError::SamplesPerChannelMismatch {
                expected: 441,
                actual: 440,
            }
        );
    }

    #[test]
    fn rejects_bad_type_and_width() {
        let mut h = header(16_000, 1, 160);
        h.frame_type = 1;
        assert_eq!(
            h.validate(),
            Err(FrameError::UnsupportedFrameType { frame_type: 1 })
        );

        let mut h = header(16_000, 1, 160);
        h.bytes_per_sample = 4;
        assert_eq!(
            h.validate(),
            Err(FrameError::UnsupportedBytesPerSample {
                bytes_per_sample: 4
            })
        );
    }

    #[test]
    fn rejects_channels_outside_mono_stereo() {
        assert_eq!(
            FrameFormat::new(16_000, 0),
            Err(FrameError::UnsupportedChannels { channels: 0 })
        );
        assert_eq!(
            FrameFormat::new(16_000, 3),
            Err(FrameError::UnsupportedChannels { channels: 3 })
        );
    }

    #[test]
    fn header_from_format_is_valid() {
        let format = FrameFormat::new(44_100, 2).unwrap();
        let h = FrameHeader::from(format);
        assert_eq!(h.samples_per_channel, 441);
        assert_eq!(h.validate(), Ok(format));
    }

    #[test]
    fn audio_frame_checks_slice_length() {
        let format = FrameFormat::new(16_000, 1).unwrap();
        let mut short = vec![0i16; 159];
        assert_eq!(
            AudioFrame::new(format, &mut short).unwrap_err(),
            FrameError::BufferLength {
                expected: 160,
                actual: 159,
            }
        );
        let mut exact = vec![0i16; 160];
        assert!(AudioFrame::new(format, &mut exact).is_ok());
    }

    #[test]
    fn mute_frame_reuses_allocation_for_same_format() {
        let mut mute = MuteFrame::default();
        let format = FrameFormat::new(48_000, 1).unwrap();

        mute.frame(format).samples_mut()[0] = 123;
        let capacity = mute.capacity();
        let frame = mute.frame(format);
        assert!(frame.samples().iter().all(|&s| s == 0));
        assert_eq!(mute.capacity(), capacity);

        let stereo = FrameFormat::new(48_000, 2).unwrap();
        assert_eq!(mute.frame(stereo).samples().len(), 960);
    }

    #[proptest]
    fn unsupported_rates_are_rejected(#[strategy(any::<i32>())] rate: i32) {
        prop_assume!(!SUPPORTED_SAMPLE_RATES_HZ.iter().any(|&r| r as i32 == rate));
        prop_assert_eq!(
            FrameFormat::new(rate, 1),
            Err(FrameError::UnsupportedSampleRate {
                sample_rate_hz: rate
            })
        );
    }

    #[proptest]
    fn only_10ms_sized_frames_validate(
        #[strategy(0usize..SUPPORTED_SAMPLE_RATES_HZ.len())] rate_idx: usize,
        #[strategy(1i32..=2)] channels: i32,
        #[strategy(-1i32..1000)] samples_per_channel: i32,
    ) {
        let rate = SUPPORTED_SAMPLE_RATES_HZ[rate_idx] as i32;
        let result = header(rate, channels, samples_per_channel).validate();
        prop_assert_eq!(result.is_ok(), samples_per_channel == rate / 100);
    }
}
