//! Error types for the model layer.
//!
//! Each Lobbyforge crate defines its own error enum. A `ModelError` always
//! means a value could not be serialized, deserialized, or parsed; it
//! never describes a lobby rule violation.

/// Errors that can occur in the model layer.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Serialization failed (turning a Rust value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust value).
    ///
    /// Common causes: a truncated record, a renamed field, or bytes
    /// written by an incompatible version.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A textual value does not name any known variant,
    /// e.g. parsing `"4v4"` as a [`LobbyType`](crate::LobbyType).
    #[error("invalid {kind}: {value:?}")]
    InvalidValue {
        /// What was being parsed ("lobby type", "league", ...).
        kind: &'static str,
        /// The rejected input.
        value: String,
    },
}
