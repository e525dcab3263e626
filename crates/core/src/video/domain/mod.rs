pub mod decode_source;
