//! Cryptographic operations for the encrypted keyring file

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, KeyInit, Nonce};
use rand::RngCore;
use zeroize::Zeroizing;

use super::format::{KEY_LEN, NONCE_LEN, SALT_LEN, TAG_LEN};
use super::KeyringError;

/// Argon2id cost parameters, stored in every file header so files written
/// with other settings stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_cost: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

/// Largest cost accepted from a file header: 1 GiB, 10 passes, 16 lanes
pub const MAX_KDF: KdfParams = KdfParams {
    memory_cost: 1024 * 1024,
    iterations: 10,
    parallelism: 16,
};

impl KdfParams {
    /// The header is not authenticated, so its costs are bounded before any
    /// key derivation runs.
    pub fn check_bounds(&self) -> Result<(), KeyringError> {
        if self.memory_cost > MAX_KDF.memory_cost
            || self.iterations > MAX_KDF.iterations
            || self.parallelism > MAX_KDF.parallelism
        {
            return Err(KeyringError::InvalidFormat(format!(
                "KDF parameters out of range: m={} t={} p={}",
                self.memory_cost, self.iterations, self.parallelism
            )));
        }
        Ok(())
    }
}

impl Default for KdfParams {
    /// 64 MiB, 3 iterations, parallelism=4
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Salt, nonce and authenticated ciphertext produced by [`seal`]
pub struct Sealed {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the 16-byte Poly1305 tag appended
    pub ciphertext: Vec<u8>,
}

/// Derive the file key from a password using Argon2id
pub fn derive_key(
    password: &str,
    salt: &[u8],
    kdf: KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, KeyringError> {
    let params = Params::new(
        kdf.memory_cost,
        kdf.iterations,
        kdf.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|_| KeyringError::CryptoError)?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut *key)
        .map_err(|_| KeyringError::CryptoError)?;

    Ok(key)
}

/// Encrypt `plaintext` under a fresh salt and nonce
pub fn seal(plaintext: &[u8], password: &str, kdf: KdfParams) -> Result<Sealed, KeyringError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt, kdf)?;
    let cipher = ChaCha20Poly1305::new_from_slice(&*key).map_err(|_| KeyringError::CryptoError)?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| KeyringError::EncryptionFailed)?;

    Ok(Sealed {
        salt,
        nonce,
        ciphertext,
    })
}

/// Decrypt and authenticate a sealed payload
///
/// Returns `DecryptionFailed` if the password is wrong or the data was tampered with
pub fn open(
    sealed: &Sealed,
    password: &str,
    kdf: KdfParams,
) -> Result<Zeroizing<Vec<u8>>, KeyringError> {
    if sealed.ciphertext.len() < TAG_LEN {
        return Err(KeyringError::InvalidFormat(
            "ciphertext shorter than authentication tag".to_string(),
        ));
    }

    let key = derive_key(password, &sealed.salt, kdf)?;
    let cipher = ChaCha20Poly1305::new_from_slice(&*key).map_err(|_| KeyringError::CryptoError)?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_ref())
        .map_err(|_| KeyringError::DecryptionFailed)?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
pub(crate) fn test_kdf() -> KdfParams {
    // Minimum Argon2 cost, keeps the suite fast.
    KdfParams {
        memory_cost: 8 * 1024,
        iterations: 1,
        parallelism: 1,
    }
}
