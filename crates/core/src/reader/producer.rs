use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;

use crate::reader::cancel_token::CancelToken;
use crate::shared::constants::PRODUCER_THREAD_NAME;
use crate::shared::frame::Frame;
use crate::video::domain::decode_source::DecodeSource;

/// Why the producer thread stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// The source reported end of stream.
    Exhausted,
    /// Decoding failed mid-stream; treated as end of stream.
    DecodeFailed,
    /// Cancellation was requested through the reader's token.
    Cancelled,
    /// The reader's receiving end went away.
    ConsumerGone,
    /// The source was not open when production started.
    NotOpened,
}

/// Returned by the producer thread when it exits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProductionReport {
    pub frames_produced: usize,
    pub end: EndReason,
}

/// Releases the wrapped source when dropped.
///
/// Also covers the closure handed to a thread that failed to spawn, which
/// std drops without running.
struct ReleaseOnDrop(Box<dyn DecodeSource>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Starts the background decode loop on its own thread.
///
/// The thread owns `source` and `frame_tx`. It always releases the source
/// before dropping `frame_tx`; the resulting disconnect is the end-of-stream
/// marker seen by the consumer, and it needs no buffer slot. If the thread
/// cannot be spawned the source is released before the error is returned.
pub(crate) fn spawn_producer(
    source: Box<dyn DecodeSource>,
    frame_tx: Sender<Frame>,
    alive: Arc<AtomicBool>,
    cancel: CancelToken,
) -> std::io::Result<JoinHandle<ProductionReport>> {
    let source = ReleaseOnDrop(source);
    std::thread::Builder::new()
        .name(PRODUCER_THREAD_NAME.to_string())
        .spawn(move || produce(source, frame_tx, alive, cancel))
}

fn produce(
    mut source: ReleaseOnDrop,
    frame_tx: Sender<Frame>,
    alive: Arc<AtomicBool>,
    cancel: CancelToken,
) -> ProductionReport {
    let mut frames_produced = 0;

    let end = if source.0.is_open() {
        log::debug!("Producer started");
        pump(&mut *source.0, &frame_tx, &cancel, &mut frames_produced)
    } else {
        log::warn!("Decode source is not open; ending stream immediately");
        EndReason::NotOpened
    };

    alive.store(false, Ordering::Release);
    drop(source);
    drop(frame_tx);

    log::debug!("Producer stopped after {frames_produced} frames: {end:?}");
    ProductionReport {
        frames_produced,
        end,
    }
}

fn pump(
    source: &mut dyn DecodeSource,
    frame_tx: &Sender<Frame>,
    cancel: &CancelToken,
    frames_produced: &mut usize,
) -> EndReason {
    loop {
        if cancel.is_cancelled() {
            return EndReason::Cancelled;
        }

        let frame = match source.read_next() {
            Ok(Some(frame)) => frame,
            Ok(None) => return EndReason::Exhausted,
            Err(e) => {
                log::warn!("Decode failed after {frames_produced} frames, ending stream: {e}");
                return EndReason::DecodeFailed;
            }
        };

        // Blocks while the buffer is full unless cancellation arrives first.
        let stopped = crossbeam_channel::select! {
            send(frame_tx, frame) -> sent => sent.err().map(|_| EndReason::ConsumerGone),
            recv(cancel.signal()) -> _ => Some(EndReason::Cancelled),
        };
        if let Some(end) = stopped {
            return end;
        }
        *frames_produced += 1;
    }
}
