use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::reader::cancel_token::CancelToken;
use crate::reader::producer::{spawn_producer, EndReason, ProductionReport};
use crate::reader::reader_config::ReaderConfig;
use crate::reader::reader_error::ReaderError;
use crate::shared::frame::Frame;
use crate::shared::source::Source;
use crate::shared::video_metadata::{MetadataError, VideoMetadata};
use crate::video::domain::decode_source::DecodeSource;
use crate::video::infrastructure::ffmpeg_source::FfmpegSource;

/// Result of one [`BatchReader::get`] call.
///
/// `more == false` is returned exactly once, always with no frames.
#[derive(Debug)]
pub struct Batch {
    pub more: bool,
    pub frames: Vec<Frame>,
}

impl Batch {
    fn end() -> Self {
        Self {
            more: false,
            frames: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

/// Reads a video source in fixed-size batches through a bounded buffer.
///
/// Layout: `decode source → producer thread → bounded channel → get()`
///
/// A dedicated thread decodes ahead of the consumer; it blocks once
/// `buffer_size` frames are waiting, so memory use is bounded no matter
/// how slowly batches are taken. `get()` waits until it has `batch_size`
/// frames or the stream ends; a short final batch is still `more == true`
/// and is followed by a single empty `more == false` response.
///
/// Dropping the reader stops the producer and joins it. The source is
/// released exactly once, by the producer, however the reader ends.
pub struct BatchReader {
    frame_rx: Option<Receiver<Frame>>,
    producer: Option<JoinHandle<ProductionReport>>,
    report: Option<ProductionReport>,
    alive: Arc<AtomicBool>,
    cancel: CancelToken,
    config: ReaderConfig,
    metadata: VideoMetadata,
    ended: bool,
}

enum Wait {
    Ended,
    TimedOut,
}

impl BatchReader {
    /// Opens `source` with the ffmpeg decoder.
    pub fn new(
        source: impl Into<Source>,
        batch_size: usize,
        buffer_size: usize,
    ) -> Result<Self, ReaderError> {
        Self::open(source, ReaderConfig::new(batch_size, buffer_size))
    }

    pub fn open(source: impl Into<Source>, config: ReaderConfig) -> Result<Self, ReaderError> {
        Self::with_decoder(Box::new(FfmpegSource::new()), &source.into(), config)
    }

    /// Opens `source` through `decoder` and starts the producer thread.
    ///
    /// Nothing is spawned when the configuration is invalid or the source
    /// cannot be opened.
    pub fn with_decoder(
        mut decoder: Box<dyn DecodeSource>,
        source: &Source,
        config: ReaderConfig,
    ) -> Result<Self, ReaderError> {
        config.validate()?;

        decoder
            .open(source)
            .map_err(|cause| ReaderError::SourceUnavailable {
                source_id: source.to_string(),
                cause,
            })?;

        let metadata = VideoMetadata::read_from(&*decoder);
        log_metadata(source, &metadata);

        let (frame_tx, frame_rx) = crossbeam_channel::bounded(config.buffer_size);
        let alive = Arc::new(AtomicBool::new(true));
        let cancel = CancelToken::new();
        let producer = spawn_producer(decoder, frame_tx, alive.clone(), cancel.clone())
            .map_err(ReaderError::Spawn)?;

        Ok(Self {
            frame_rx: Some(frame_rx),
            producer: Some(producer),
            report: None,
            alive,
            cancel,
            config,
            metadata,
            ended: false,
        })
    }

    /// Blocks until a full batch is available or the stream has ended.
    ///
    /// Returns [`ReaderError::Exhausted`] once the `more == false` response
    /// has been handed out.
    pub fn get(&mut self) -> Result<Batch, ReaderError> {
        self.collect(None)
    }

    /// Like [`get`](Self::get), but waits at most `timeout`.
    ///
    /// Frames collected before the deadline are returned as a short batch;
    /// if none arrived, the call fails with [`ReaderError::Timeout`] and the
    /// reader stays usable.
    pub fn get_timeout(&mut self, timeout: Duration) -> Result<Batch, ReaderError> {
        self.collect(Some(Instant::now() + timeout))
    }

    /// Iterates over the remaining batches, stopping at end of stream.
    pub fn batches(&mut self) -> Batches<'_> {
        Batches { reader: self }
    }

    fn collect(&mut self, deadline: Option<Instant>) -> Result<Batch, ReaderError> {
        if self.ended {
            return Err(ReaderError::Exhausted);
        }
        let Some(frame_rx) = self.frame_rx.as_ref() else {
            return Err(ReaderError::Exhausted);
        };

        let batch_size = self.config.batch_size;
        // Never more than a buffer's worth is ready at once; grow past that.
        let mut frames = Vec::with_capacity(batch_size.min(self.config.buffer_size));
        let mut stop = None;

        while frames.len() < batch_size {
            let next = match deadline {
                None => frame_rx.recv().map_err(|_| Wait::Ended),
                Some(deadline) => frame_rx.recv_deadline(deadline).map_err(|e| match e {
                    RecvTimeoutError::Timeout => Wait::TimedOut,
                    RecvTimeoutError::Disconnected => Wait::Ended,
                }),
            };
            match next {
                Ok(frame) => frames.push(frame),
                Err(wait) => {
                    stop = Some(wait);
                    break;
                }
            }
        }

        if !frames.is_empty() {
            return Ok(Batch { more: true, frames });
        }

        match stop {
            Some(Wait::TimedOut) => Err(ReaderError::Timeout),
            _ => {
                self.ended = true;
                self.join_producer();
                Ok(Batch::end())
            }
        }
    }

    /// Asks the producer to stop. Frames already buffered remain readable,
    /// after which `get()` reports the end of the stream.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle that can cancel this reader from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// True until the producer has stopped decoding.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Frames currently waiting in the buffer (never above `buffer_size`).
    pub fn buffered(&self) -> usize {
        self.frame_rx.as_ref().map_or(0, Receiver::len)
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    pub fn buffer_size(&self) -> usize {
        self.config.buffer_size
    }

    pub fn config(&self) -> ReaderConfig {
        self.config
    }

    /// The producer's exit report, available once the stream has ended.
    pub fn production_report(&self) -> Option<ProductionReport> {
        self.report
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    pub fn fps(&self) -> Result<f64, MetadataError> {
        self.metadata.fps()
    }

    pub fn frame_count(&self) -> Result<u64, MetadataError> {
        self.metadata.frame_count()
    }

    /// Milliseconds per frame.
    pub fn frame_duration(&self) -> Result<f64, MetadataError> {
        self.metadata.frame_duration()
    }

    /// Milliseconds for the whole stream.
    pub fn video_duration(&self) -> Result<f64, MetadataError> {
        self.metadata.video_duration()
    }

    fn join_producer(&mut self) {
        let Some(handle) = self.producer.take() else {
            return;
        };
        match handle.join() {
            Ok(report) => {
                match report.end {
                    EndReason::Exhausted | EndReason::Cancelled | EndReason::ConsumerGone => {
                        log::debug!(
                            "Producer finished: {} frames ({:?})",
                            report.frames_produced,
                            report.end
                        )
                    }
                    EndReason::DecodeFailed | EndReason::NotOpened => log::warn!(
                        "Stream ended early: {} frames ({:?})",
                        report.frames_produced,
                        report.end
                    ),
                }
                self.report = Some(report);
            }
            Err(_) => log::error!("Producer thread panicked"),
        }
    }
}

impl Drop for BatchReader {
    fn drop(&mut self) {
        self.cancel.cancel();
        // A producer blocked on a full buffer fails its send once the
        // receiver is gone.
        drop(self.frame_rx.take());
        self.join_producer();
    }
}

/// Iterator returned by [`BatchReader::batches`].
pub struct Batches<'a> {
    reader: &'a mut BatchReader,
}

impl Iterator for Batches<'_> {
    type Item = Vec<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.get() {
            Ok(batch) if batch.more => Some(batch.frames),
            _ => None,
        }
    }
}

fn log_metadata(source: &Source, metadata: &VideoMetadata) {
    for (field, error) in [
        ("fps", metadata.fps().err()),
        ("frame_count", metadata.frame_count().err()),
        ("frame_duration", metadata.frame_duration().err()),
        ("video_duration", metadata.video_duration().err()),
    ] {
        if let Some(error) = error {
            log::debug!("{source}: {field} unknown ({error})");
        }
    }
}
