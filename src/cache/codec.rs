//! Codec Module
//!
//! Encode pipeline: value -> JSON bytes -> zlib stream.
//! Decode pipeline runs the same steps in reverse. The zlib framing carries
//! an adler32 trailer, so damaged entries fail to decode instead of
//! yielding a different value; freshness still lives in the file's mtime.

use std::io::{self, Write};

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Failure inside the encode/decode pipeline, tagged by stage.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("serialize: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("compress: {0}")]
    Compress(#[source] io::Error),

    #[error("decompress: {0}")]
    Decompress(#[source] io::Error),

    #[error("deserialize: {0}")]
    Deserialize(#[source] serde_json::Error),
}

// == Encode ==
/// Serializes and compresses `value` at the given deflate level.
pub fn encode<T>(value: &T, level: u32) -> Result<Vec<u8>, CodecError>
where
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_vec(value).map_err(CodecError::Serialize)?;

    let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::new(level));
    encoder.write_all(&raw).map_err(CodecError::Compress)?;
    encoder.finish().map_err(CodecError::Compress)
}

// == Decode ==
/// Decompresses and deserializes bytes produced by [`encode`].
///
/// The zlib stream must end exactly at the end of `bytes`: a stream cut
/// short or followed by trailing data is rejected.
pub fn decode<T>(bytes: &[u8]) -> Result<T, CodecError>
where
    T: DeserializeOwned,
{
    let raw = inflate(bytes)?;
    serde_json::from_slice(&raw).map_err(CodecError::Deserialize)
}

fn inflate(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let corrupt =
        |msg: String| CodecError::Decompress(io::Error::new(io::ErrorKind::InvalidData, msg));

    let mut inflater = Decompress::new(true);
    let mut raw = Vec::with_capacity(bytes.len() * 4 + 64);

    loop {
        let consumed = inflater.total_in() as usize;
        let status = inflater
            .decompress_vec(&bytes[consumed..], &mut raw, FlushDecompress::Finish)
            .map_err(|e| corrupt(e.to_string()))?;

        match status {
            Status::StreamEnd => break,
            // Output buffer full, grow it and keep going
            _ if raw.len() == raw.capacity() => raw.reserve(raw.capacity().max(64)),
            _ => return Err(corrupt("unexpected end of stream".to_string())),
        }
    }

    if inflater.total_in() as usize != bytes.len() {
        return Err(corrupt(format!(
            "{} trailing bytes after stream",
            bytes.len() - inflater.total_in() as usize
        )));
    }

    Ok(raw)
}
