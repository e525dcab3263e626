use crate::shared::frame::Frame;
use crate::shared::source::Source;

pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Produces decoded frames one at a time, in presentation order.
///
/// Implementations handle the container/codec details. The reader only
/// needs sequential access plus a couple of static metadata queries, and
/// drives the source from its background thread, hence `Send`.
pub trait DecodeSource: Send {
    /// Opens the source. On error the source stays closed.
    fn open(&mut self, source: &Source) -> Result<(), SourceError>;

    fn is_open(&self) -> bool;

    /// Decodes the next frame. `Ok(None)` marks the end of the stream.
    fn read_next(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Frees decoder resources. Must be safe to call more than once.
    fn release(&mut self);

    /// Frames per second as reported by the container, if any.
    fn fps(&self) -> Option<f64>;

    /// Total frame count, possibly estimated.
    fn frame_count(&self) -> Option<u64>;

    /// `(width, height)` of decoded frames, when known before decoding.
    fn dimensions(&self) -> Option<(u32, u32)> {
        None
    }
}
