//! Token storage and context resolution
//!
//! Tokens are persisted through a [`TokenStore`]; [`resolve`] combines
//! per-invocation overrides with the current context recorded by a
//! [`ConfigStore`].

pub mod config;
pub mod context;
pub mod error;
pub mod keychain;
pub mod label;
pub mod memory;
pub mod token;

pub use config::{Config, ConfigError, ConfigStore, FileConfigStore};
pub use context::{current_token, resolve};
pub use error::TokenError;
pub use keychain::KeychainTokenStore;
pub use label::{decode_label, encode_label, split_api_token};
pub use memory::MemoryTokenStore;
pub use token::{Token, TokenStore, REDACTED_MESSAGE};
