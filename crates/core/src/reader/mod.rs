pub mod batch_reader;
pub mod cancel_token;
pub mod producer;
pub mod reader_config;
pub mod reader_error;
#[cfg(test)]
pub(crate) mod scripted_source;
