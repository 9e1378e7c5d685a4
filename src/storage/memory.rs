//! In-memory TokenStore
//!
//! Same packing and redaction rules as the keychain store, without touching
//! the OS. Intended for tests of code that consumes a [`TokenStore`].

use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::label::{decode_label, encode_label, split_api_token};
use super::token::{Token, TokenStore, REDACTED_MESSAGE};
use super::TokenError;
use crate::backend::KeyringError;

#[derive(Clone)]
struct Entry {
    label: String,
    secret: String,
}

#[derive(Default)]
pub struct MemoryTokenStore {
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl TokenStore for MemoryTokenStore {
    fn list(&self, reveal_tokens: bool) -> Result<Vec<Token>, TokenError> {
        let entries = self.entries.lock();
        Ok(entries
            .iter()
            .map(|(system, entry)| {
                let (prefix, endpoint) = decode_label(&entry.label);
                Token {
                    system: system.clone(),
                    endpoint,
                    prefix,
                    secret: if reveal_tokens {
                        entry.secret.clone()
                    } else {
                        REDACTED_MESSAGE.to_string()
                    },
                }
            })
            .collect())
    }

    fn get(&self, system: &str) -> Result<Token, TokenError> {
        let entry = self
            .entries
            .lock()
            .get(system)
            .cloned()
            .ok_or(TokenError::TokenNotFound)?;

        let (prefix, endpoint) = decode_label(&entry.label);
        Ok(Token {
            system: system.to_string(),
            endpoint,
            prefix,
            secret: entry.secret,
        })
    }

    fn put(&self, system: &str, endpoint: &str, secret: &str) -> Result<(), TokenError> {
        let (prefix, secret) = split_api_token(secret);
        self.entries.lock().insert(
            system.to_string(),
            Entry {
                label: encode_label(&prefix, endpoint),
                secret,
            },
        );
        Ok(())
    }

    fn delete(&self, system: &str) -> Result<(), TokenError> {
        match self.entries.lock().remove(system) {
            Some(_) => Ok(()),
            None => Err(KeyringError::KeyNotFound(system.to_string()).into()),
        }
    }
}
