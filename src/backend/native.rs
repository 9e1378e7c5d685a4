//! OS Keychain Backend
//!
//! Stores each item in the system keychain via the `keyring` crate. The
//! platform APIs cannot enumerate entries, so an index entry tracks the keys
//! written through this backend.

use keyring::Entry;
use serde::{Deserialize, Serialize};

use super::{Item, Keyring, KeyringError};

/// Account name of the entry listing every stored key
const INDEX_KEY: &str = "__index__";

/// Password payload of an item entry
#[derive(Serialize, Deserialize)]
struct EntryDocument {
    label: String,
    data: String,
}

/// Raw secret storage addressed by account name
pub trait CredentialStore {
    fn get_password(&self, account: &str) -> keyring::Result<String>;
    fn set_password(&self, account: &str, password: &str) -> keyring::Result<()>;
    fn delete_credential(&self, account: &str) -> keyring::Result<()>;
}

/// The platform keychain, scoped to one service name
pub struct SystemKeychain {
    service: String,
}

impl SystemKeychain {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }
}

impl CredentialStore for SystemKeychain {
    fn get_password(&self, account: &str) -> keyring::Result<String> {
        Entry::new(&self.service, account)?.get_password()
    }

    fn set_password(&self, account: &str, password: &str) -> keyring::Result<()> {
        Entry::new(&self.service, account)?.set_password(password)
    }

    fn delete_credential(&self, account: &str) -> keyring::Result<()> {
        Entry::new(&self.service, account)?.delete_credential()
    }
}

/// Keychain-backed keyring
pub struct NativeKeyring<S = SystemKeychain> {
    store: S,
    username: String,
}

impl NativeKeyring {
    /// Open the keychain for `service`, probing that the platform store is
    /// reachable so callers can fall back when it is not.
    pub fn open(service: &str) -> Result<Self, KeyringError> {
        let keyring = Self::with_store(SystemKeychain::new(service), whoami::username())?;
        tracing::debug!("Keychain available: service={}", service);
        Ok(keyring)
    }
}

impl<S: CredentialStore> NativeKeyring<S> {
    pub fn with_store(store: S, username: String) -> Result<Self, KeyringError> {
        let keyring = Self { store, username };
        keyring.read_index()?;
        Ok(keyring)
    }

    // Use explicit username to ensure stable keychain identity on macOS
    fn account(&self, key: &str) -> String {
        format!("{}@{}", self.username, key)
    }

    fn read_index(&self) -> Result<Vec<String>, KeyringError> {
        match self.store.get_password(&self.account(INDEX_KEY)) {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(keyring::Error::NoEntry) => Ok(Vec::new()),
            Err(e) => Err(KeyringError::Native(e)),
        }
    }

    fn write_index(&self, keys: &[String]) -> Result<(), KeyringError> {
        let json = serde_json::to_string(keys)?;
        self.store.set_password(&self.account(INDEX_KEY), &json)?;
        Ok(())
    }

    fn entry_exists(&self, key: &str) -> Result<bool, KeyringError> {
        match self.store.get_password(&self.account(key)) {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(KeyringError::Native(e)),
        }
    }

    fn check_key(key: &str) -> Result<(), KeyringError> {
        if key == INDEX_KEY {
            return Err(KeyringError::ReservedKey(key.to_string()));
        }
        Ok(())
    }
}

impl<S: CredentialStore> Keyring for NativeKeyring<S> {
    /// Indexed keys whose entry was removed outside this backend are dropped
    /// from the index.
    fn keys(&mut self) -> Result<Vec<String>, KeyringError> {
        let indexed = self.read_index()?;
        let mut keys = Vec::with_capacity(indexed.len());
        for key in &indexed {
            if self.entry_exists(key)? {
                keys.push(key.clone());
            } else {
                tracing::warn!("Keychain index lists missing entry, pruning: key={}", key);
            }
        }
        if keys.len() != indexed.len() {
            self.write_index(&keys)?;
        }
        Ok(keys)
    }

    fn get(&mut self, key: &str) -> Result<Item, KeyringError> {
        Self::check_key(key)?;
        match self.store.get_password(&self.account(key)) {
            Ok(json) => {
                let doc: EntryDocument = serde_json::from_str(&json)?;
                tracing::debug!("Keychain get success: key={}", key);
                Ok(Item {
                    key: key.to_string(),
                    label: doc.label,
                    data: doc.data,
                })
            }
            Err(keyring::Error::NoEntry) => {
                tracing::debug!("Keychain get: no entry for key={}", key);
                Err(KeyringError::KeyNotFound(key.to_string()))
            }
            Err(e) => {
                tracing::error!("Keychain get failed: key={}, error={:?}", key, e);
                Err(KeyringError::Native(e))
            }
        }
    }

    fn set(&mut self, item: Item) -> Result<(), KeyringError> {
        Self::check_key(&item.key)?;
        tracing::info!("Keychain store: key={}", item.key);

        // Read the index before touching the entry so a broken index fails
        // the whole operation.
        let mut keys = self.read_index()?;

        let json = serde_json::to_string(&EntryDocument {
            label: item.label,
            data: item.data,
        })?;
        self.store.set_password(&self.account(&item.key), &json)?;

        if !keys.contains(&item.key) {
            keys.push(item.key);
            self.write_index(&keys)?;
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), KeyringError> {
        Self::check_key(key)?;
        let mut keys = self.read_index()?;

        let result = match self.store.delete_credential(&self.account(key)) {
            Ok(()) => {
                tracing::info!("Keychain delete: key={}", key);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Err(KeyringError::KeyNotFound(key.to_string())),
            Err(e) => return Err(KeyringError::Native(e)),
        };

        let before = keys.len();
        keys.retain(|k| k != key);
        if keys.len() != before {
            self.write_index(&keys)?;
        }
        result
    }
}
