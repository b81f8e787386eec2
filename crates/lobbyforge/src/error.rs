//! Unified error type for Lobbyforge.

use lobbyforge_lobby::{ErrorKind, LobbyError};
use lobbyforge_model::ModelError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `lobbyforge` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LobbyforgeError {
    /// A model-level error (encode, decode, invalid value).
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A lobby-level error (bad slot, banned, setup in progress...).
    #[error(transparent)]
    Lobby(#[from] LobbyError),
}

impl LobbyforgeError {
    /// Broad category of the error. Model errors count as validation
    /// failures: the input couldn't be read.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Model(_) => ErrorKind::Validation,
            Self::Lobby(err) => err.kind(),
        }
    }
}
