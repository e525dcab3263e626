use std::process;
use std::time::{Duration, Instant};

use clap::Parser;

use xvideos_core::shared::constants::{DEFAULT_BATCH_SIZE, DEFAULT_BUFFER_SIZE};
use xvideos_core::{BatchReader, MetadataError, ReaderConfig, ReaderError, Source};

/// Read a video source in buffered batches and report throughput.
#[derive(Parser)]
#[command(name = "xvideos")]
struct Cli {
    /// Video file, stream URI, or capture device index (e.g. 0).
    source: String,

    /// Frames returned per batch.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Decoded frames held ahead of the consumer.
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Give up if no frame arrives within this many milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Stop after this many batches (useful for endless device streams).
    #[arg(long)]
    max_batches: Option<usize>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let source = Source::from(cli.source.as_str());
    let config = ReaderConfig::new(cli.batch_size, cli.buffer_size);
    config.validate()?;

    let mut reader = BatchReader::open(source.clone(), config)?;
    log::info!("Opened {source}");
    log::info!(
        "  fps: {}  frames: {}  frame duration: {}  video duration: {}",
        describe(reader.fps(), |v| format!("{v:.3}")),
        describe(reader.frame_count(), |v| v.to_string()),
        describe(reader.frame_duration(), |v| format!("{v:.2} ms")),
        describe(reader.video_duration(), |v| format!("{:.2} s", v / 1000.0)),
    );
    if let Some((w, h)) = reader.metadata().dimensions() {
        log::info!("  size: {w}x{h}");
    }

    let total = reader.frame_count().ok();
    let timeout = cli.timeout_ms.map(Duration::from_millis);
    let started = Instant::now();
    let mut frames = 0usize;
    let mut batches = 0usize;

    loop {
        if cli.max_batches.is_some_and(|max| batches >= max) {
            log::info!("Stopping after {batches} batches");
            break;
        }

        let batch = match timeout {
            Some(timeout) => match reader.get_timeout(timeout) {
                Err(ReaderError::Timeout) => {
                    return Err(format!("no frames within {} ms", timeout.as_millis()).into())
                }
                other => other?,
            },
            None => reader.get()?,
        };
        if !batch.more {
            break;
        }

        batches += 1;
        frames += batch.len();
        print_progress(frames, total);
    }
    eprintln!();

    let elapsed = started.elapsed().as_secs_f64();
    let fps = if elapsed > 0.0 {
        frames as f64 / elapsed
    } else {
        0.0
    };
    log::info!("Read {frames} frames in {batches} batches ({elapsed:.2}s, {fps:.1} fps)");
    Ok(())
}

fn describe<T>(value: Result<T, MetadataError>, format: impl Fn(T) -> String) -> String {
    match value {
        Ok(v) => format(v),
        Err(_) => "unknown".to_string(),
    }
}

fn print_progress(current: usize, total: Option<u64>) {
    match total {
        Some(total) if total > 0 => {
            let pct = current as f64 / total as f64 * 100.0;
            eprint!("\rReading: {current}/{total} frames ({pct:.1}%)");
        }
        _ => eprint!("\rReading: {current} frames"),
    }
}
