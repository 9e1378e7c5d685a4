//! zed credentials
//!
//! Secure storage of permissions-system API tokens and resolution of the
//! connection context used by each CLI invocation.

pub mod backend;
pub mod env;
pub mod paths;
pub mod storage;

pub use backend::{Backend, KeyringConfig, KeyringError};
pub use storage::{
    current_token, resolve, Config, ConfigError, ConfigStore, FileConfigStore,
    KeychainTokenStore, MemoryTokenStore, Token, TokenError, TokenStore,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging
///
/// Filter comes from `RUST_LOG` (default `info`). Output goes to stderr so it
/// never mixes with command output.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
