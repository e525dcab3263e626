pub mod constants;
pub mod frame;
pub mod source;
pub mod video_metadata;
