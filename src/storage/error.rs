//! Error types for token storage and context resolution

use thiserror::Error;

use super::config::ConfigError;
use crate::backend::KeyringError;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token does not exist")]
    TokenNotFound,

    /// Reserved for callers detecting duplicate names; not raised by this crate.
    #[error("multiple tokens with the same name")]
    MultipleTokens,

    #[error("must first save a token: see `zed token save --help`")]
    NoCurrentContext,

    #[error(transparent)]
    Keyring(#[from] KeyringError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
