//! In-memory [`DecodeSource`] used by the reader tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::shared::frame::Frame;
use crate::shared::source::Source;
use crate::video::domain::decode_source::{DecodeSource, SourceError};

/// Counters shared between a test and the source it handed to a reader.
#[derive(Default)]
pub struct Tally {
    reads: AtomicUsize,
    releases: AtomicUsize,
}

impl Tally {
    /// Frames successfully returned by `read_next`.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Polls until `reads() >= n`, returning false on timeout.
    pub fn wait_for_reads(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.reads() < n {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

/// Yields `total` 1x1 RGB frames whose pixel bytes encode their index.
pub struct ScriptedSource {
    total: usize,
    next: usize,
    open: bool,
    fail_open: bool,
    stay_closed: bool,
    fail_at: Option<usize>,
    stall: Option<(usize, Duration)>,
    fps: Option<f64>,
    frame_count: Option<u64>,
    tally: Arc<Tally>,
}

impl ScriptedSource {
    pub fn with_frames(total: usize) -> Self {
        Self {
            total,
            next: 0,
            open: false,
            fail_open: false,
            stay_closed: false,
            fail_at: None,
            stall: None,
            fps: Some(30.0),
            frame_count: Some(total as u64),
            tally: Arc::new(Tally::default()),
        }
    }

    /// Marks the source open without going through `open`.
    pub fn opened(mut self) -> Self {
        self.open = true;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// `open` succeeds but `is_open` keeps reporting false.
    pub fn staying_closed(mut self) -> Self {
        self.stay_closed = true;
        self
    }

    /// `read_next` errors when asked for frame `index`.
    pub fn fail_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Sleeps for `delay` before producing each frame from `index` on.
    pub fn stall_from(mut self, index: usize, delay: Duration) -> Self {
        self.stall = Some((index, delay));
        self
    }

    pub fn fps(mut self, fps: Option<f64>) -> Self {
        self.fps = fps;
        self
    }

    pub fn tally(&self) -> Arc<Tally> {
        self.tally.clone()
    }

    pub fn frame(index: usize) -> Frame {
        Frame::new(vec![index as u8; 3], 1, 1, 3, index)
    }
}

impl DecodeSource for ScriptedSource {
    fn open(&mut self, _source: &Source) -> Result<(), SourceError> {
        if self.fail_open {
            return Err("scripted open failure".into());
        }
        self.open = !self.stay_closed;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read_next(&mut self) -> Result<Option<Frame>, SourceError> {
        if !self.open {
            return Err("not opened".into());
        }
        if self.fail_at == Some(self.next) {
            return Err(format!("scripted decode failure at frame {}", self.next).into());
        }
        if self.next >= self.total {
            return Ok(None);
        }
        if let Some((from, delay)) = self.stall {
            if self.next >= from {
                std::thread::sleep(delay);
            }
        }
        let frame = Self::frame(self.next);
        self.next += 1;
        self.tally.reads.fetch_add(1, Ordering::SeqCst);
        Ok(Some(frame))
    }

    fn release(&mut self) {
        self.open = false;
        self.tally.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        Some((1, 1))
    }
}
