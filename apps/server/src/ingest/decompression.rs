use flate2::read::{DeflateDecoder, GzDecoder};
use std::io::Read;

use crate::error::{AppError, AppResult};

/// Brotli decoder buffer size
const BROTLI_BUFFER_SIZE: usize = 4096;

/// Content-Encoding values the decoder understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Deflate,
    Brotli,
}

impl ContentEncoding {
    /// Parses a Content-Encoding header value; absent means identity
    pub fn parse(header: Option<&str>) -> AppResult<Self> {
        let Some(value) = header else {
            return Ok(ContentEncoding::Identity);
        };

        match value.trim().to_ascii_lowercase().as_str() {
            "" | "identity" => Ok(ContentEncoding::Identity),
            "gzip" | "x-gzip" => Ok(ContentEncoding::Gzip),
            "deflate" => Ok(ContentEncoding::Deflate),
            "br" => Ok(ContentEncoding::Brotli),
            other => Err(AppError::MalformedPayload(format!(
                "Unsupported Content-Encoding: {}",
                other
            ))),
        }
    }
}

/// Decompresses the body according to the declared encoding.
///
/// The output never exceeds `max_size` bytes; larger results fail with
/// `PayloadTooLarge` instead of being buffered in full.
pub fn decompress_body(
    body: &[u8],
    encoding: ContentEncoding,
    max_size: usize,
) -> AppResult<Vec<u8>> {
    let decompressed = match encoding {
        ContentEncoding::Identity => body.to_vec(),
        ContentEncoding::Gzip => decompress_gzip(body, max_size)?,
        ContentEncoding::Deflate => decompress_deflate(body, max_size)?,
        ContentEncoding::Brotli => decompress_brotli(body, max_size)?,
    };

    if decompressed.len() > max_size {
        return Err(too_large(max_size));
    }

    Ok(decompressed)
}

/// Speculative gzip for bodies that declared no encoding.
///
/// Returns `None` when the data is not gzip or fails to inflate, in which case
/// the caller keeps the raw body. Size overruns are still reported.
pub fn try_gunzip(body: &[u8], max_size: usize) -> AppResult<Option<Vec<u8>>> {
    if !has_gzip_magic(body) {
        return Ok(None);
    }

    match read_bounded(GzDecoder::new(body), max_size) {
        Ok(decompressed) => Ok(Some(decompressed)),
        Err(ReadError::TooLarge) => Err(too_large(max_size)),
        Err(ReadError::Io(e)) => {
            log::debug!("speculative gzip failed ({}), using raw body", e);
            Ok(None)
        }
    }
}

/// Gzip streams start with 1f 8b
pub fn has_gzip_magic(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

fn decompress_gzip(data: &[u8], max_size: usize) -> AppResult<Vec<u8>> {
    read_bounded(GzDecoder::new(data), max_size).map_err(|e| e.into_app_error("gzip", max_size))
}

fn decompress_deflate(data: &[u8], max_size: usize) -> AppResult<Vec<u8>> {
    read_bounded(DeflateDecoder::new(data), max_size)
        .map_err(|e| e.into_app_error("deflate", max_size))
}

fn decompress_brotli(data: &[u8], max_size: usize) -> AppResult<Vec<u8>> {
    read_bounded(brotli::Decompressor::new(data, BROTLI_BUFFER_SIZE), max_size)
        .map_err(|e| e.into_app_error("brotli", max_size))
}

enum ReadError {
    TooLarge,
    Io(std::io::Error),
}

impl ReadError {
    fn into_app_error(self, codec: &str, max_size: usize) -> AppError {
        match self {
            ReadError::TooLarge => too_large(max_size),
            ReadError::Io(e) => AppError::MalformedPayload(format!("Invalid {} data: {}", codec, e)),
        }
    }
}

/// Reads at most `max_size + 1` bytes so oversized streams are detected early
fn read_bounded<R: Read>(reader: R, max_size: usize) -> Result<Vec<u8>, ReadError> {
    let mut decompressed = Vec::new();
    reader
        .take(max_size as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(ReadError::Io)?;

    if decompressed.len() > max_size {
        return Err(ReadError::TooLarge);
    }

    Ok(decompressed)
}

fn too_large(max_size: usize) -> AppError {
    AppError::PayloadTooLarge(format!("Decompressed payload exceeds {} bytes", max_size))
}

/// Extracts Content-Encoding from the request headers
pub fn get_content_encoding(req: &actix_web::HttpRequest) -> Option<String> {
    req.headers()
        .get("content-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase())
}
