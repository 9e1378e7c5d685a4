//! TokenStore backed by the OS keychain, falling back to an encrypted file
//! on disk if the OS has no keychain.

use super::label::{decode_label, encode_label, split_api_token};
use super::token::{Token, TokenStore, REDACTED_MESSAGE};
use super::TokenError;
use crate::backend::{self, EnvOrPrompt, Item, Keyring, KeyringConfig, KeyringError, PasswordSource};
use crate::env::SystemEnv;

/// Keychain-backed token store
///
/// Every operation opens its own keyring handle; nothing (including the file
/// password) is cached between calls.
pub struct KeychainTokenStore<P = EnvOrPrompt> {
    config: KeyringConfig,
    passwords: P,
}

impl KeychainTokenStore {
    /// Store configured from the process environment
    pub fn from_env() -> Result<Self, KeyringError> {
        Ok(Self::new(
            KeyringConfig::from_env(&SystemEnv)?,
            EnvOrPrompt::new(),
        ))
    }
}

impl<P: PasswordSource> KeychainTokenStore<P> {
    pub fn new(config: KeyringConfig, passwords: P) -> Self {
        Self { config, passwords }
    }

    fn open_keyring(&self) -> Result<Box<dyn Keyring + '_>, KeyringError> {
        backend::open(&self.config, &self.passwords)
    }
}

fn token_from_item(item: Item, reveal: bool) -> Token {
    let (prefix, endpoint) = decode_label(&item.label);
    Token {
        system: item.key,
        endpoint,
        prefix,
        secret: if reveal {
            item.data
        } else {
            REDACTED_MESSAGE.to_string()
        },
    }
}

impl<P: PasswordSource> TokenStore for KeychainTokenStore<P> {
    fn list(&self, reveal_tokens: bool) -> Result<Vec<Token>, TokenError> {
        let mut ring = self.open_keyring()?;

        let keys = ring.keys()?;
        let mut tokens = Vec::with_capacity(keys.len());
        for key in keys {
            let item = ring.get(&key)?;
            tokens.push(token_from_item(item, reveal_tokens));
        }

        tracing::debug!("Listed {} tokens (revealed: {})", tokens.len(), reveal_tokens);
        Ok(tokens)
    }

    fn get(&self, system: &str) -> Result<Token, TokenError> {
        let mut ring = self.open_keyring()?;

        let item = match ring.get(system) {
            Ok(item) => item,
            Err(KeyringError::KeyNotFound(_)) => return Err(TokenError::TokenNotFound),
            Err(e) => return Err(e.into()),
        };
        tracing::trace!("keychain item: {:?}", item);

        Ok(token_from_item(item, true))
    }

    fn put(&self, system: &str, endpoint: &str, secret: &str) -> Result<(), TokenError> {
        let (prefix, secret) = split_api_token(secret);

        let mut ring = self.open_keyring()?;
        ring.set(Item {
            key: system.to_string(),
            label: encode_label(&prefix, endpoint),
            data: secret,
        })?;

        tracing::info!("Saved token for system {}", system);
        Ok(())
    }

    fn delete(&self, system: &str) -> Result<(), TokenError> {
        let mut ring = self.open_keyring()?;
        ring.remove(system)?;

        tracing::info!("Deleted token for system {}", system);
        Ok(())
    }
}
