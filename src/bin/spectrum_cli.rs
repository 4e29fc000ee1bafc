use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use led_spectrum::audio::{CaptureSource, ThreadedCapture};
use led_spectrum::config::AppConfig;
use led_spectrum::display::JsonLineSink;
use led_spectrum::fixtures::{SineCapture, WavCapture};
use led_spectrum::pipeline::{Pipeline, RenderMode};

#[derive(Parser, Debug)]
#[command(
    name = "spectrum_cli",
    about = "Offline harness for the LED spectrum analysis pipeline"
)]
struct Cli {
    /// JSON config file (defaults are used when omitted or unreadable)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Bars,
    Strobe,
    Both,
}

impl From<ModeArg> for RenderMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Bars => RenderMode::Bars,
            ModeArg::Strobe => RenderMode::Strobe,
            ModeArg::Both => RenderMode::Both,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline over a 16-bit PCM WAV file, one JSON frame per line
    Analyze {
        wav: PathBuf,
        /// Override the configured render mode
        #[arg(long)]
        mode: Option<ModeArg>,
        /// Run capture on its own thread through the block pool
        #[arg(long)]
        threaded: bool,
        /// Write frames to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run the pipeline over a synthesized sine tone
    Tone {
        /// Tone frequency in Hz
        #[arg(long, default_value_t = 1000.0)]
        freq: f64,
        /// Amplitude as a fraction of full scale
        #[arg(long, default_value_t = 0.8)]
        amplitude: f64,
        /// Number of blocks to process
        #[arg(long, default_value_t = 43)]
        blocks: usize,
        #[arg(long)]
        mode: Option<ModeArg>,
    },
    /// Print the effective configuration as JSON
    DumpConfig,
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Analyze {
            wav,
            mode,
            threaded,
            output,
        } => run_analyze(config, wav, mode, threaded, output),
        Commands::Tone {
            freq,
            amplitude,
            blocks,
            mode,
        } => run_tone(config, freq, amplitude, blocks, mode),
        Commands::DumpConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
    }
}

fn run_analyze(
    mut config: AppConfig,
    wav: PathBuf,
    mode: Option<ModeArg>,
    threaded: bool,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    if let Some(mode) = mode {
        config.mode = mode.into();
    }

    let capture = WavCapture::open(&wav)
        .with_context(|| format!("opening capture fixture {}", wav.display()))?;
    if capture.sample_rate() != config.transform.sample_rate {
        log::info!(
            "[Cli] Using WAV sample rate {} Hz instead of configured {} Hz",
            capture.sample_rate(),
            config.transform.sample_rate
        );
        config.transform.sample_rate = capture.sample_rate();
    }

    let mut pipeline = Pipeline::new(&config).context("building pipeline")?;
    let block_size = pipeline.block_size();

    let mut capture: Box<dyn CaptureSource> = if threaded {
        Box::new(ThreadedCapture::spawn(capture, block_size, 4))
    } else {
        Box::new(capture)
    };

    let interrupt = AtomicBool::new(false);
    let summary = match output {
        Some(path) => {
            let writer = BufWriter::new(
                File::create(&path).with_context(|| format!("creating {}", path.display()))?,
            );
            let mut sink = JsonLineSink::new(writer);
            pipeline.run(capture.as_mut(), &mut sink, &interrupt)?;
            sink.frames()
        }
        None => {
            let stdout = io::stdout();
            let mut sink = JsonLineSink::new(stdout.lock());
            pipeline.run(capture.as_mut(), &mut sink, &interrupt)?;
            sink.frames()
        }
    };

    eprintln!(
        "{} frames, {} beats ({} blocks)",
        summary,
        pipeline.beats_detected(),
        pipeline.blocks_processed()
    );
    Ok(ExitCode::from(0))
}

fn run_tone(
    mut config: AppConfig,
    freq: f64,
    amplitude: f64,
    blocks: usize,
    mode: Option<ModeArg>,
) -> Result<ExitCode> {
    if let Some(mode) = mode {
        config.mode = mode.into();
    }

    let mut pipeline = Pipeline::new(&config).context("building pipeline")?;
    let mut capture = SineCapture::new(freq, config.transform.sample_rate, amplitude)
        .with_block_limit(blocks);

    let stdout = io::stdout();
    let mut sink = JsonLineSink::new(stdout.lock());
    let interrupt = AtomicBool::new(false);
    pipeline.run(&mut capture, &mut sink, &interrupt)?;

    io::stdout().flush().ok();
    eprintln!(
        "{} blocks of {:.1} Hz tone, {} beats",
        pipeline.blocks_processed(),
        freq,
        pipeline.beats_detected()
    );
    Ok(ExitCode::from(0))
}
