//! Run a WAV file through a processor and write the result.
//!
//! The near-end capture is processed in 10 ms frames. With `--aec` and
//! `--farin`, the far-end file feeds the reverse stream; otherwise silence
//! does. The output is padded by the engine's algorithm latency and written
//! both as WAV and as raw PCM (`<out>.pcm`).
//!
//! ```sh
//! cargo run -p uap3a --features examples --example wav_harness -- \
//!     --nearin near.wav --out processed.wav --ans --bghvs
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing_subscriber::EnvFilter;

use uap3a::{
    AudioFrame, DumpOption, FrameFormat, LogSink, LoopbackEngine, ProcessorConfig,
    ProcessorOptions, ReferenceMode, Service, ServiceConfig,
};

#[derive(Parser, Debug)]
#[command(about = "Process a near-end WAV file through the uplink 3A pipeline")]
struct Args {
    /// Near-end (microphone) recording, 16-bit PCM.
    #[arg(long)]
    nearin: PathBuf,

    /// Path for the processed recording. Raw PCM goes to `<out>.pcm`.
    #[arg(long)]
    out: PathBuf,

    /// Far-end (loudspeaker) recording; used only together with `--aec`.
    #[arg(long)]
    farin: Option<PathBuf>,

    /// Enable echo cancellation.
    #[arg(long)]
    aec: bool,

    /// Enable noise suppression.
    #[arg(long)]
    ans: bool,

    /// Enable automatic gain control.
    #[arg(long)]
    agc: bool,

    /// Enable background human voice suppression.
    #[arg(long)]
    bghvs: bool,

    #[arg(long, env = "UAP3A_APP_ID", default_value = "uap3a-harness")]
    app_id: String,

    #[arg(long, env = "UAP3A_LICENSE", default_value = "", hide_env_values = true)]
    license: String,

    /// Directory holding the model weight files.
    #[arg(long, env = "UAP3A_RESOURCE_PATH", default_value = ".")]
    resource_path: PathBuf,

    /// Directory for engine dumps. Dumping is off when omitted. With
    /// `--bghvs`, BGHVS data also goes to its `bghvs/` subdirectory.
    #[arg(long)]
    dump_dir: Option<PathBuf>,
}

/// A whole recording held in memory.
struct Recording {
    spec: WavSpec,
    format: FrameFormat,
    samples: Vec<i16>,
}

impl Recording {
    fn read(path: &Path) -> Result<Self> {
        let reader =
            WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            bail!("{}: only 16-bit PCM is supported", path.display());
        }
        let format = FrameFormat::new(
            i32::try_from(spec.sample_rate)?,
            i32::from(spec.channels),
        )
        .with_context(|| format!("{}: unsupported format", path.display()))?;
        let samples = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Self {
            spec,
            format,
            samples,
        })
    }

    fn num_frames(&self) -> usize {
        self.samples.len() / self.format.num_samples()
    }

    /// Copies frame `index` into `dst`, or silence past the end.
    fn copy_frame(&self, index: usize, dst: &mut [i16]) {
        let start = index * dst.len();
        match self.samples.get(start..start + dst.len()) {
            Some(src) => dst.copy_from_slice(src),
            None => dst.fill(0),
        }
    }
}

fn config_from_args(args: &Args, aec: bool) -> ProcessorConfig {
    let mut config = ProcessorConfig::recommended();
    config.aec.enabled = Some(aec);
    config.ans.enabled = Some(args.ans);
    config.agc.enabled = Some(args.agc);
    config.bghvs.enabled = Some(args.bghvs);
    config
}

fn pcm_side_path(out: &Path) -> PathBuf {
    let mut path = out.as_os_str().to_owned();
    path.push(".pcm");
    PathBuf::from(path)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let near = Recording::read(&args.nearin)?;
    let far = match (&args.farin, args.aec) {
        (Some(path), true) => Some(Recording::read(path)?),
        (Some(path), false) => {
            tracing::warn!(farin = %path.display(), "far-end input ignored without --aec");
            None
        }
        (None, _) => None,
    };
    // Echo cancellation needs a far-end signal.
    let aec = far.is_some();
    if args.aec && !aec {
        tracing::warn!("--aec given without --farin; echo cancellation disabled");
    }
    let far_format = far.as_ref().map_or(near.format, |far| far.format);

    let config = config_from_args(&args, aec);
    println!("{config}");

    let service = Service::initialize(ServiceConfig::new(
        args.app_id.as_str(),
        args.license.as_str(),
        args.resource_path.as_path(),
    ));
    let mut processor = service.create_processor(
        Box::new(LoopbackEngine::new()),
        Arc::new(LogSink),
        &config,
        ProcessorOptions {
            dump_dir: args.dump_dir.clone(),
            reference_mode: ReferenceMode::MuteWhenAecDisabled,
            ..ProcessorOptions::default()
        },
    );

    println!("engine sdk {}", processor.sdk_version()?);
    if let (true, Some(dir)) = (args.bghvs, &args.dump_dir) {
        processor.enable_bghvs_data_dump(&DumpOption::enabled_at(dir.join("bghvs")))?;
    }

    let state = processor.state(near.format.sample_rate_hz())?;
    let latency_ms = state.algorithm_latency_ms.unwrap_or(0);
    let latency_frames = usize::try_from(latency_ms / 10)?;
    let valid_frames = near.num_frames();
    let total_frames = valid_frames + latency_frames;
    println!(
        "near: {} Hz x {} ch, {valid_frames} frames; latency {latency_ms} ms",
        near.format.sample_rate_hz(),
        near.format.num_channels(),
    );

    let mut wav = WavWriter::create(&args.out, near.spec)
        .with_context(|| format!("creating {}", args.out.display()))?;
    let pcm_path = pcm_side_path(&args.out);
    let mut pcm = BufWriter::new(
        File::create(&pcm_path).with_context(|| format!("creating {}", pcm_path.display()))?,
    );

    let mut near_buf = vec![0i16; near.format.num_samples()];
    let mut far_buf = vec![0i16; far_format.num_samples()];
    let mut elapsed = Duration::ZERO;

    for index in 0..total_frames {
        near.copy_frame(index, &mut near_buf);
        if let Some(far) = &far {
            far.copy_frame(index, &mut far_buf);
        }

        let started = Instant::now();
        {
            let mut frame = AudioFrame::new(near.format, &mut near_buf)?;
            let mut reference = AudioFrame::new(far_format, &mut far_buf)?;
            processor
                .process_stream(&mut frame, Some(&mut reference))
                .with_context(|| format!("processing frame {index}"))?;
        }
        elapsed += started.elapsed();

        for &sample in &near_buf {
            wav.write_sample(sample)?;
        }
        pcm.write_all(bytemuck::cast_slice(&near_buf))?;
    }

    wav.finalize()?;
    pcm.flush()?;

    let average = elapsed / u32::try_from(total_frames.max(1))?;
    println!(
        "processed {total_frames} frames in {} ms ({} us/frame, file {} ms)",
        elapsed.as_millis(),
        average.as_micros(),
        valid_frames * 10,
    );
    let state = processor.state(far_format.sample_rate_hz())?;
    println!("final state: {state:?}");
    println!("Wrote {} and {}", args.out.display(), pcm_path.display());

    processor.release()?;
    Ok(())
}
