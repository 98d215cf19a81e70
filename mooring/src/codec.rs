//! Pluggable message serialization.
//!
//! Channel helpers own the wire format; [`MessageCodec`] is the seam between
//! a helper and whatever serialization the application uses. [`JsonCodec`]
//! is the batteries-included default.
//!
//! # Example
//!
//! ```
//! use mooring::{JsonCodec, MessageCodec};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Hello {
//!     seq: u32,
//! }
//!
//! let codec = JsonCodec;
//! let bytes = codec.encode(&Hello { seq: 1 }).expect("encode");
//! let back: Hello = codec.decode(&bytes).expect("decode");
//! assert_eq!(back, Hello { seq: 1 });
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors produced while encoding or decoding messages.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serialization of an outbound value failed.
    #[error("failed to encode message: {0}")]
    Encode(Box<dyn std::error::Error + Send + Sync>),

    /// Deserialization of inbound bytes failed.
    #[error("failed to decode message: {0}")]
    Decode(Box<dyn std::error::Error + Send + Sync>),
}

/// Converts typed values to and from wire bytes.
///
/// Codecs are cloned into helper I/O paths, so implementations should be
/// cheap to clone (typically zero-sized or `Arc`-backed).
pub trait MessageCodec: Clone + Send + Sync + 'static {
    /// Encodes a value into bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] when serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> CodecResult<Vec<u8>>;

    /// Decodes bytes into a value.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] when the bytes are not a valid
    /// encoding of `T`.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> CodecResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode(Box::new(e)))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}
