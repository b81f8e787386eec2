//! Codec trait and implementations for serializing persisted values.
//!
//! A "codec" converts between Rust types and raw bytes. Storage adapters
//! don't care HOW a lobby is serialized; they just need something that
//! implements [`Codec`]. Today that's [`JsonCodec`], which keeps stored
//! records readable while debugging.

use serde::{Serialize, de::DeserializeOwned};

use crate::ModelError;

/// A codec that can encode Rust values to bytes and decode them back.
///
/// `Send + Sync + 'static` lets a codec live inside long-lived shared
/// state (a repository held by every lobby actor).
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ModelError::Encode` if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ModelError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ModelError::Decode` if the bytes are malformed or don't
    /// match the expected shape.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ModelError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// Behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use lobbyforge_model::{Codec, JsonCodec, LobbyType};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&LobbyType::Highlander).unwrap();
/// let decoded: LobbyType = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, LobbyType::Highlander);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ModelError> {
        serde_json::to_vec(value).map_err(ModelError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ModelError> {
        serde_json::from_slice(data).map_err(ModelError::Decode)
    }
}
