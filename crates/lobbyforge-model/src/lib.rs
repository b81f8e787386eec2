//! Shared model for Lobbyforge.
//!
//! This crate defines the vocabulary every other layer speaks:
//!
//! - **Types** ([`PlayerId`], [`LobbyId`], [`LobbyType`], [`League`], etc.):
//!   identities and closed enums describing a lobby.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how persisted aggregates
//!   are converted to/from bytes.
//! - **Errors** ([`ModelError`]): what can go wrong while encoding,
//!   decoding, or parsing model values.
//!
//! # Architecture
//!
//! The model layer knows nothing about slots, actors, or servers. It only
//! describes values and how to serialize them.
//!
//! ```text
//! Model (ids, enums, codec) → Lobby core (slots, bans, lifecycle) → Facade
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ModelError;
pub use types::{
    League, LobbyId, LobbyType, PlayerId, ServerInfo, SteamId, Whitelist,
};
