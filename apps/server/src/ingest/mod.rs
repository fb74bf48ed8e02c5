pub mod decoder;
pub mod decompression;

pub use decoder::{decode, parse_event, MediaType};
pub use decompression::{decompress_body, get_content_encoding, ContentEncoding};
