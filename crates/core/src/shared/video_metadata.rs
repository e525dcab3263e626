use thiserror::Error;

use crate::video::domain::decode_source::DecodeSource;

/// Why a metadata field has no value. Each field fails independently.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum MetadataError {
    #[error("{0} is not reported by the source")]
    NotReported(&'static str),
    #[error("source reports an unusable fps of {0}")]
    InvalidFps(f64),
    #[error("{0} cannot be derived because an input field is unknown")]
    Underivable(&'static str),
}

/// Stream properties captured once when a reader is opened.
///
/// Durations are in milliseconds. A field that could not be determined
/// holds its [`MetadataError`] instead of a value.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    fps: Result<f64, MetadataError>,
    frame_count: Result<u64, MetadataError>,
    frame_duration: Result<f64, MetadataError>,
    video_duration: Result<f64, MetadataError>,
    dimensions: Option<(u32, u32)>,
}

impl VideoMetadata {
    /// Queries an opened source.
    pub fn read_from(source: &dyn DecodeSource) -> Self {
        Self::from_parts(source.fps(), source.frame_count(), source.dimensions())
    }

    pub fn from_parts(
        fps: Option<f64>,
        frame_count: Option<u64>,
        dimensions: Option<(u32, u32)>,
    ) -> Self {
        let fps = match fps {
            None => Err(MetadataError::NotReported("fps")),
            Some(v) if !v.is_finite() || v <= 0.0 => Err(MetadataError::InvalidFps(v)),
            Some(v) => Ok(v),
        };
        let frame_count = frame_count.ok_or(MetadataError::NotReported("frame_count"));
        let frame_duration = fps
            .map(|fps| 1000.0 / fps)
            .map_err(|_| MetadataError::Underivable("frame_duration"));
        let video_duration = match (frame_duration, frame_count) {
            (Ok(d), Ok(n)) => Ok(d * n as f64),
            _ => Err(MetadataError::Underivable("video_duration")),
        };

        Self {
            fps,
            frame_count,
            frame_duration,
            video_duration,
            dimensions,
        }
    }

    pub fn fps(&self) -> Result<f64, MetadataError> {
        self.fps
    }

    pub fn frame_count(&self) -> Result<u64, MetadataError> {
        self.frame_count
    }

    /// Milliseconds per frame: `1000 / fps`.
    pub fn frame_duration(&self) -> Result<f64, MetadataError> {
        self.frame_duration
    }

    /// Milliseconds for the whole stream: `frame_duration * frame_count`.
    pub fn video_duration(&self) -> Result<f64, MetadataError> {
        self.video_duration
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }
}
