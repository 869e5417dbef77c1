//! Turns ordered chunk payloads back into the uploaded JSON document.
//!
//! Compressed uploads carry a gzip stream encoded as standard base64, split
//! across chunks at arbitrary character boundaries. The chunks are joined
//! first, then decoded and inflated as a whole.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde_json::Value;
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReassemblyError {
    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

pub fn reassemble(ordered_chunks: &[String], is_compressed: bool) -> Result<Value, ReassemblyError> {
    let joined = ordered_chunks.concat();

    let text = if is_compressed {
        decompress_payload(&joined)?
    } else {
        joined
    };

    Ok(serde_json::from_str(&text)?)
}

pub fn decompress_payload(encoded: &str) -> Result<String, ReassemblyError> {
    let compressed = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ReassemblyError::DecompressionFailed(format!("invalid base64: {}", e)))?;

    let mut text = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut text)
        .map_err(|e| ReassemblyError::DecompressionFailed(e.to_string()))?;
    Ok(text)
}

/// Client-side inverse of [`decompress_payload`].
pub fn compress_payload(json: &str) -> std::io::Result<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(json.as_bytes())?;
    Ok(STANDARD.encode(encoder.finish()?))
}

/// Splits `payload` into at most `parts` pieces of near-equal length,
/// never cutting a UTF-8 character.
pub fn split_into_chunks(payload: &str, parts: usize) -> Vec<String> {
    let parts = parts.max(1);
    let chars: Vec<char> = payload.chars().collect();
    let size = chars.len().div_ceil(parts).max(1);
    chars
        .chunks(size)
        .map(|piece| piece.iter().collect())
        .collect()
}
