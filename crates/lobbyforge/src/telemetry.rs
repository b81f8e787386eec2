//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` isn't set.
pub const DEFAULT_FILTER: &str = "lobbyforge=info,lobbyforge_lobby=info,warn";

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_FILTER`].
///
/// Returns `false` if a global subscriber was already installed (e.g. by
/// the application or another test), in which case nothing changes.
pub fn init_tracing() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
