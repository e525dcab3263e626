use crate::reader::reader_error::ReaderError;
use crate::shared::constants::{DEFAULT_BATCH_SIZE, DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE};

/// Sizing for a [`BatchReader`](crate::reader::batch_reader::BatchReader).
///
/// `batch_size` is the most frames one `get()` returns; `buffer_size` is
/// the most decoded frames held in memory at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReaderConfig {
    pub batch_size: usize,
    pub buffer_size: usize,
}

impl ReaderConfig {
    pub fn new(batch_size: usize, buffer_size: usize) -> Self {
        Self {
            batch_size,
            buffer_size,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn validate(&self) -> Result<(), ReaderError> {
        if self.batch_size < 1 {
            return Err(ReaderError::InvalidConfig("batch_size must be >= 1"));
        }
        if self.buffer_size < 1 {
            return Err(ReaderError::InvalidConfig("buffer_size must be >= 1"));
        }
        if self.buffer_size > MAX_BUFFER_SIZE {
            return Err(ReaderError::InvalidConfig("buffer_size must be <= 65536"));
        }
        Ok(())
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, DEFAULT_BUFFER_SIZE)
    }
}
