use thiserror::Error;

use crate::video::domain::decode_source::SourceError;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("cannot open {source_id}: {cause}")]
    SourceUnavailable {
        source_id: String,
        #[source]
        cause: SourceError,
    },
    #[error("invalid reader configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("failed to start producer thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("timed out waiting for frames")]
    Timeout,
    #[error("stream already ended; no further batches")]
    Exhausted,
}
