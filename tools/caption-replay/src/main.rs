//! SignCaption Replay
//!
//! Replays a recorded landmark stream (JSONL) through the caption pipeline
//! and writes caption events as JSONL.
//!
//! # Usage
//!
//! ```bash
//! # Scripted classifier: one JSON array of probabilities per line
//! signcaption-replay -i session.jsonl --probabilities probs.jsonl
//!
//! # ONNX model (built with --features onnx)
//! signcaption-replay -i session.jsonl --model action.onnx --config pipeline.yaml
//!
//! # Stream from a landmark extractor on stdin
//! landmark-extractor --jsonl | signcaption-replay -i - --probabilities probs.jsonl
//! ```

mod input;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use signcaption_core::{
    AsyncFrameLoop, CaptionSession, CaptionSink, Classifier, FrameLoop, FrameRead,
    HolisticFeatureExtractor, JsonlSink, LandmarkFrame, PipelineConfig, ScriptExhausted,
    ScriptedClassifier, SessionStats,
};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Replay recorded landmark frames through the SignCaption pipeline
#[derive(Parser)]
#[command(name = "signcaption-replay")]
#[command(author, version, about)]
struct Args {
    /// Input recording: file path or `-` for stdin
    #[arg(short = 'i', long, help = "Landmark JSONL file or '-' for stdin")]
    input: String,

    /// Output destination for JSONL events [default: stdout]
    #[arg(short = 'o', long, default_value = "-", help = "Output file or '-' for stdout")]
    output: String,

    /// Pipeline configuration file (.json, .toml, .yaml)
    #[arg(short = 'c', long)]
    config: Option<String>,

    /// Scripted classifier outputs, one JSON array per line
    #[arg(long, conflicts_with = "model")]
    probabilities: Option<String>,

    /// What the scripted classifier does after its last output
    #[arg(long, value_enum, default_value = "fail")]
    exhausted: Exhausted,

    /// ONNX gesture model
    #[arg(long)]
    model: Option<String>,

    /// Apply softmax to the model output
    #[arg(long, requires = "model")]
    softmax: bool,

    /// Override the confidence threshold
    #[arg(long)]
    threshold: Option<f32>,

    /// Override the window length
    #[arg(long)]
    window_size: Option<usize>,

    /// Run the blocking loop instead of the async one
    #[arg(long)]
    blocking: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Exhausted {
    Cycle,
    RepeatLast,
    Fail,
}

impl From<Exhausted> for ScriptExhausted {
    fn from(value: Exhausted) -> Self {
        match value {
            Exhausted::Cycle => ScriptExhausted::Cycle,
            Exhausted::RepeatLast => ScriptExhausted::RepeatLast,
            Exhausted::Fail => ScriptExhausted::Fail,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to stderr
    let filter = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let config = load_config(&args)?;
    let classifier = build_classifier(&args)?;
    if let Some(n) = classifier.num_labels() {
        if n != config.num_labels() {
            anyhow::bail!(
                "Classifier emits {} labels but the vocabulary has {}",
                n,
                config.num_labels()
            );
        }
    }

    let sink = open_sink(&args.output)?;
    let session = CaptionSession::new(&config).context("Invalid pipeline configuration")?;
    tracing::info!("Replaying {} (session {})", args.input, session.session_id());

    let (session, stats) = if args.blocking {
        run_blocking(&args, session, classifier, sink).await?
    } else {
        run_async(&args, &config, session, classifier, sink).await?
    };

    if !args.quiet {
        eprintln!();
        eprintln!("Caption:  {}", session.render());
        eprintln!(
            "Frames:   {} received, {} skipped",
            stats.frames_received, stats.frames_skipped
        );
        eprintln!(
            "Windows:  {} classified, {} confirmed, {} caption updates",
            stats.windows_classified, stats.labels_confirmed, stats.caption_updates
        );
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path))?,
        None => PipelineConfig::default(),
    };

    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(window_size) = args.window_size {
        config.window_size = window_size;
    }
    config.validate().context("Invalid pipeline configuration")?;
    Ok(config)
}

fn build_classifier(args: &Args) -> Result<Arc<dyn Classifier>> {
    if let Some(path) = &args.probabilities {
        let classifier = ScriptedClassifier::from_jsonl(path, args.exhausted.into())
            .with_context(|| format!("Failed to load scripted outputs from {}", path))?;
        return Ok(Arc::new(classifier));
    }

    if let Some(path) = &args.model {
        return load_model(path, args.softmax);
    }

    anyhow::bail!("No classifier specified. Use --probabilities <file> or --model <file>.")
}

#[cfg(feature = "onnx")]
fn load_model(path: &str, softmax: bool) -> Result<Arc<dyn Classifier>> {
    use signcaption_core::{OnnxClassifier, OnnxClassifierConfig};

    let mut config = OnnxClassifierConfig::new(path);
    config.apply_softmax = softmax;
    let classifier = OnnxClassifier::load(&config)
        .with_context(|| format!("Failed to load model {}", path))?;
    Ok(Arc::new(classifier))
}

#[cfg(not(feature = "onnx"))]
fn load_model(_path: &str, _softmax: bool) -> Result<Arc<dyn Classifier>> {
    anyhow::bail!("ONNX support not compiled in. Rebuild with --features onnx.")
}

fn open_sink(output: &str) -> Result<Arc<dyn CaptionSink>> {
    if output == "-" {
        return Ok(Arc::new(JsonlSink::stdout()));
    }
    let file = std::fs::File::create(output)
        .with_context(|| format!("Failed to create output {}", output))?;
    Ok(Arc::new(JsonlSink::new(std::io::BufWriter::new(file))))
}

/// Forward Ctrl+C to a stop callback
fn on_ctrl_c(stop: impl FnOnce() + Send + 'static) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping session");
            stop();
        }
    });
}

async fn run_blocking(
    args: &Args,
    session: CaptionSession,
    classifier: Arc<dyn Classifier>,
    sink: Arc<dyn CaptionSink>,
) -> Result<(CaptionSession, SessionStats)> {
    let reader = input::open_blocking(&args.input)?;
    let mut frame_loop =
        FrameLoop::new(session, HolisticFeatureExtractor::new(), classifier).with_sink(sink);

    let stop = frame_loop.stop_handle();
    on_ctrl_c(move || stop.stop());

    tokio::task::spawn_blocking(move || {
        let mut source = input::JsonlFrameSource::new(reader);
        let mut presenter = |_: &LandmarkFrame, caption: &str| {
            tracing::trace!("caption: '{}'", caption);
        };
        let stats = frame_loop
            .run(&mut source, &mut presenter)
            .context("Caption session aborted")?;
        Ok::<_, anyhow::Error>((frame_loop.into_session(), stats))
    })
    .await
    .context("Replay task failed")?
}

async fn run_async(
    args: &Args,
    config: &PipelineConfig,
    session: CaptionSession,
    classifier: Arc<dyn Classifier>,
    sink: Arc<dyn CaptionSink>,
) -> Result<(CaptionSession, SessionStats)> {
    let reader = input::open_async(&args.input).await?;
    let handle = AsyncFrameLoop::new(session, HolisticFeatureExtractor::new(), classifier)
        .with_sink(sink)
        .with_max_in_flight(config.max_in_flight)
        .spawn(config.window_size.max(16));

    let stop = handle.stop_handle();
    on_ctrl_c(move || stop.stop());

    let mut lines = input::async_lines(reader);
    let mut line_no = 0;
    loop {
        let read = input::next_frame_async(&mut lines, &mut line_no).await?;
        let end = read == FrameRead::End;
        if handle.push(read).await.is_err() || end {
            break;
        }
    }

    let session = handle.finish().await.context("Caption session aborted")?;
    let stats = session.stats();
    Ok((session, stats))
}
