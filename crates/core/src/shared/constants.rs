pub const DEFAULT_BATCH_SIZE: usize = 1;
pub const DEFAULT_BUFFER_SIZE: usize = 1;

/// Largest accepted `buffer_size`; the channel reserves every slot up front.
pub const MAX_BUFFER_SIZE: usize = 65_536;

/// Name given to the background decode thread.
pub const PRODUCER_THREAD_NAME: &str = "xvideos-producer";

/// Channels per pixel in frames produced by the ffmpeg source (RGB24).
pub const RGB_CHANNELS: u8 = 3;
