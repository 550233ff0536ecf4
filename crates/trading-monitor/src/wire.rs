//! Framing for events sent to out-of-process listeners.
//!
//! A frame is one flag byte followed by the JSON encoding of an [`Event`].
//! Flag `0` means the JSON follows as is; flag `1` means it is gzip
//! compressed.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use thiserror::Error;
use trading_core::events::Event;

pub const FLAG_PLAIN: u8 = 0;
pub const FLAG_GZIP: u8 = 1;

/// Payloads at or below this size are sent uncompressed.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("empty frame")]
    Empty,

    #[error("unknown frame flag {0}")]
    UnknownFlag(u8),

    #[error("event encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("compression failed: {0}")]
    Io(#[from] std::io::Error),
}

pub fn encode_frame(event: &Event, threshold: usize) -> Result<Vec<u8>, WireError> {
    let json = serde_json::to_vec(event)?;
    if json.len() <= threshold {
        let mut frame = Vec::with_capacity(json.len() + 1);
        frame.push(FLAG_PLAIN);
        frame.extend_from_slice(&json);
        return Ok(frame);
    }

    let mut encoder = GzEncoder::new(vec![FLAG_GZIP], Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

pub fn decode_frame(frame: &[u8]) -> Result<Event, WireError> {
    let (flag, body) = frame.split_first().ok_or(WireError::Empty)?;
    match *flag {
        FLAG_PLAIN => Ok(serde_json::from_slice(body)?),
        FLAG_GZIP => {
            let mut json = Vec::new();
            GzDecoder::new(body).read_to_end(&mut json)?;
            Ok(serde_json::from_slice(&json)?)
        }
        other => Err(WireError::UnknownFlag(other)),
    }
}
