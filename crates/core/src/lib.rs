//! Buffered, batched frame reading.
//!
//! A [`BatchReader`] opens a video file, stream URI or capture device,
//! decodes ahead of the caller on a background thread into a bounded
//! buffer, and hands frames out in batches of a fixed size.

pub mod reader;
pub mod shared;
pub mod video;

pub use reader::batch_reader::{Batch, BatchReader};
pub use reader::cancel_token::CancelToken;
pub use reader::reader_config::ReaderConfig;
pub use reader::reader_error::ReaderError;
pub use shared::frame::Frame;
pub use shared::source::Source;
pub use shared::video_metadata::{MetadataError, VideoMetadata};
