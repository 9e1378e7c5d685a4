//! On-disk layout of the encrypted keyring file
//!
//! ```text
//! magic "ZEDKRNG1"   8 bytes
//! version            u32 LE
//! memory_cost        u32 LE  (KiB)
//! iterations         u32 LE
//! parallelism        u32 LE
//! salt               32 bytes
//! nonce              12 bytes
//! ciphertext + tag   remainder
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::crypto::{KdfParams, Sealed};
use super::KeyringError;

/// Magic number identifying keyring files
pub const MAGIC: &[u8; 8] = b"ZEDKRNG1";

/// Current file format version
pub const VERSION: u32 = 1;

/// Lengths of fixed-size fields
pub const SALT_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// Bytes preceding the ciphertext
pub const HEADER_LEN: usize = MAGIC.len() + 4 * 4 + SALT_LEN + NONCE_LEN;

/// Decrypted contents of the keyring file
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VaultPayload {
    pub version: u32,
    pub items: BTreeMap<String, StoredItem>,
}

/// An item as persisted; the key lives in the enclosing map.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredItem {
    pub label: String,
    pub data: String,
}

impl std::fmt::Debug for StoredItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredItem")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Parsed keyring file
pub struct VaultFile {
    pub kdf: KdfParams,
    pub sealed: Sealed,
}

impl VaultFile {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.sealed.ciphertext.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&self.kdf.memory_cost.to_le_bytes());
        bytes.extend_from_slice(&self.kdf.iterations.to_le_bytes());
        bytes.extend_from_slice(&self.kdf.parallelism.to_le_bytes());
        bytes.extend_from_slice(&self.sealed.salt);
        bytes.extend_from_slice(&self.sealed.nonce);
        bytes.extend_from_slice(&self.sealed.ciphertext);
        bytes
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, KeyringError> {
        if data.len() < MAGIC.len() || &data[..MAGIC.len()] != MAGIC {
            return Err(KeyringError::InvalidMagic);
        }
        if data.len() < HEADER_LEN + TAG_LEN {
            return Err(KeyringError::InvalidFormat("file truncated".to_string()));
        }

        let version = le_u32(data, 8);
        if version != VERSION {
            return Err(KeyringError::UnsupportedVersion(version));
        }

        let kdf = KdfParams {
            memory_cost: le_u32(data, 12),
            iterations: le_u32(data, 16),
            parallelism: le_u32(data, 20),
        };
        kdf.check_bounds()?;

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&data[24..24 + SALT_LEN]);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&data[24 + SALT_LEN..HEADER_LEN]);

        Ok(Self {
            kdf,
            sealed: Sealed {
                salt,
                nonce,
                ciphertext: data[HEADER_LEN..].to_vec(),
            },
        })
    }
}

fn le_u32(data: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[at..at + 4]);
    u32::from_le_bytes(buf)
}
