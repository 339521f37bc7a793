//! Content compression for large messages.
//!
//! Content whose serialized size reaches the threshold is replaced by
//! `{"data": "<base64 deflate>"}` and the message is stamped with
//! `_compressed` and `_originalSize`.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::errors::DomainError;
use crate::domain::models::Message;

/// Field of the wrapper object holding the encoded payload.
const PAYLOAD_FIELD: &str = "data";

/// Upper bound on the preallocation for inflated content, as a multiple of
/// the encoded payload. `_originalSize` comes off the wire and is only a hint.
const MAX_INFLATION_HINT: usize = 16;

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("Compressed message {0} has no payload")]
    MissingPayload(uuid::Uuid),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Deflate stream error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decompressed payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<CompressionError> for DomainError {
    fn from(err: CompressionError) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct MessageCompressor {
    threshold_bytes: usize,
}

impl Default for MessageCompressor {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl MessageCompressor {
    pub const fn new(threshold_bytes: usize) -> Self {
        Self { threshold_bytes }
    }

    pub const fn threshold(&self) -> usize {
        self.threshold_bytes
    }

    /// Compress the content if it is large enough. Never fails: on any
    /// encoding error the message is returned unchanged.
    pub fn compress(&self, mut message: Message) -> Message {
        if message.compressed {
            return message;
        }
        match self.encode(&message.content) {
            Ok(Some((wrapper, original_size))) => {
                tracing::trace!(
                    message_id = %message.id,
                    original_size,
                    "Compressed message content"
                );
                message.content = wrapper;
                message.compressed = true;
                message.original_size = Some(original_size);
                message
            }
            Ok(None) => message,
            Err(e) => {
                tracing::warn!(message_id = %message.id, error = %e, "Compression failed, sending uncompressed");
                message
            }
        }
    }

    /// Restore compressed content. A no-op for uncompressed messages.
    pub fn decompress(&self, mut message: Message) -> Result<Message, CompressionError> {
        if !message.compressed {
            return Ok(message);
        }
        let encoded = message
            .content
            .get(PAYLOAD_FIELD)
            .and_then(Value::as_str)
            .ok_or(CompressionError::MissingPayload(message.id))?;

        let bytes = STANDARD.decode(encoded)?;
        let hint = message
            .original_size
            .unwrap_or(0)
            .min(bytes.len().saturating_mul(MAX_INFLATION_HINT));
        let mut raw = Vec::with_capacity(hint);
        DeflateDecoder::new(bytes.as_slice()).read_to_end(&mut raw)?;

        message.content = serde_json::from_slice(&raw)?;
        message.compressed = false;
        message.original_size = None;
        Ok(message)
    }

    fn encode(&self, content: &Value) -> Result<Option<(Value, usize)>, CompressionError> {
        let raw = serde_json::to_vec(content)?;
        if raw.len() < self.threshold_bytes {
            return Ok(None);
        }
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        let deflated = encoder.finish()?;
        Ok(Some((json!({ PAYLOAD_FIELD: STANDARD.encode(deflated) }), raw.len())))
    }
}
