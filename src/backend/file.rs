//! Encrypted File Backend
//!
//! Fallback for platforms without a keychain. All items live in one file,
//! encrypted with a key derived from the user's password. The password is
//! requested at most once per handle, and only when the file has to be read
//! or written.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use zeroize::Zeroizing;

use super::crypto::{self, KdfParams};
use super::format::{StoredItem, VaultFile, VaultPayload, VERSION};
use super::password::PasswordSource;
use super::{Item, Keyring, KeyringError};

/// Keyring stored in a single encrypted file
pub struct FileKeyring<'a> {
    path: PathBuf,
    kdf: KdfParams,
    passwords: &'a dyn PasswordSource,
    password: Option<Zeroizing<String>>,
    items: Option<BTreeMap<String, StoredItem>>,
}

impl<'a> FileKeyring<'a> {
    pub fn new(path: PathBuf, kdf: KdfParams, passwords: &'a dyn PasswordSource) -> Self {
        tracing::debug!("FileKeyring opened: path={:?}", path);
        Self {
            path,
            kdf,
            passwords,
            password: None,
            items: None,
        }
    }

    fn password(&mut self) -> Result<&str, KeyringError> {
        if self.password.is_none() {
            let prompt = format!("Enter passphrase to unlock {}", self.path.display());
            self.password = Some(self.passwords.password(&prompt)?);
        }
        Ok(self.password.as_deref().map(String::as_str).unwrap_or_default())
    }

    /// Load and decrypt the file; a missing file is an empty keyring
    fn items(&mut self) -> Result<&mut BTreeMap<String, StoredItem>, KeyringError> {
        if self.items.is_none() {
            let loaded = self.load()?;
            self.items = Some(loaded);
        }
        Ok(self.items.get_or_insert_with(BTreeMap::new))
    }

    fn load(&mut self) -> Result<BTreeMap<String, StoredItem>, KeyringError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Keyring file not found, starting empty");
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(KeyringError::Io(e)),
        };

        let file = VaultFile::from_bytes(&bytes)?;
        let password = self.password()?;
        let plaintext = crypto::open(&file.sealed, password, file.kdf)?;
        let payload: VaultPayload = serde_json::from_slice(&plaintext)?;
        if payload.version != VERSION {
            return Err(KeyringError::UnsupportedVersion(payload.version));
        }

        tracing::debug!("Keyring file loaded, {} items", payload.items.len());
        Ok(payload.items)
    }

    /// Encrypt the current items and replace the file atomically
    fn save(&mut self) -> Result<(), KeyringError> {
        let payload = VaultPayload {
            version: VERSION,
            items: self.items.take().unwrap_or_default(),
        };
        let plaintext = Zeroizing::new(serde_json::to_vec(&payload)?);
        self.items = Some(payload.items);

        let kdf = self.kdf;
        let password = self.password()?;
        let sealed = crypto::seal(&plaintext, password, kdf)?;
        let bytes = VaultFile { kdf, sealed }.to_bytes();

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to temp file first, then rename (atomic write)
        let temp_path = self.path.with_extension("vault.tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&self.path, perms);
        }

        tracing::debug!("Keyring file saved: path={:?}", self.path);
        Ok(())
    }
}

impl Keyring for FileKeyring<'_> {
    fn keys(&mut self) -> Result<Vec<String>, KeyringError> {
        Ok(self.items()?.keys().cloned().collect())
    }

    fn get(&mut self, key: &str) -> Result<Item, KeyringError> {
        let stored = self
            .items()?
            .get(key)
            .cloned()
            .ok_or_else(|| KeyringError::KeyNotFound(key.to_string()))?;

        Ok(Item {
            key: key.to_string(),
            label: stored.label,
            data: stored.data,
        })
    }

    fn set(&mut self, item: Item) -> Result<(), KeyringError> {
        self.items()?.insert(
            item.key,
            StoredItem {
                label: item.label,
                data: item.data,
            },
        );
        self.save()
    }

    fn remove(&mut self, key: &str) -> Result<(), KeyringError> {
        if self.items()?.remove(key).is_none() {
            return Err(KeyringError::KeyNotFound(key.to_string()));
        }
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::crypto::test_kdf;
    use std::cell::Cell;
    use std::io;
    use tempfile::TempDir;

    /// Fixed password that counts how often it was requested
    struct CountingPassword {
        password: &'static str,
        calls: Cell<usize>,
    }

    impl CountingPassword {
        fn new(password: &'static str) -> Self {
            Self {
                password,
                calls: Cell::new(0),
            }
        }
    }

    impl PasswordSource for CountingPassword {
        fn password(&self, _prompt: &str) -> Result<Zeroizing<String>, KeyringError> {
            self.calls.set(self.calls.get() + 1);
            Ok(Zeroizing::new(self.password.to_string()))
        }
    }

    fn item(key: &str, label: &str, data: &str) -> Item {
        Item {
            key: key.to_string(),
            label: label.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_without_password() {
        let temp = TempDir::new().unwrap();
        let passwords = CountingPassword::new("pw");
        let mut keyring = FileKeyring::new(temp.path().join("keyring.vault"), test_kdf(), &passwords);

        assert!(keyring.keys().unwrap().is_empty());
        assert!(matches!(keyring.get("sysA"), Err(KeyringError::KeyNotFound(k)) if k == "sysA"));
        assert_eq!(passwords.calls.get(), 0);
    }

    #[test]
    fn test_set_get_across_handles() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("keyring.vault");
        let passwords = CountingPassword::new("pw");

        {
            let mut keyring = FileKeyring::new(path.clone(), test_kdf(), &passwords);
            keyring.set(item("sysA", "pfx@ep1", "secX")).unwrap();
            keyring.set(item("sysB", "@ep2", "secY")).unwrap();
        }
        assert!(path.exists());
        // New file: one prompt for the whole handle
        assert_eq!(passwords.calls.get(), 1);

        let mut keyring = FileKeyring::new(path, test_kdf(), &passwords);
        assert_eq!(keyring.keys().unwrap(), vec!["sysA", "sysB"]);
        let loaded = keyring.get("sysA").unwrap();
        assert_eq!(loaded, item("sysA", "pfx@ep1", "secX"));
        assert_eq!(passwords.calls.get(), 2);
    }

    #[test]
    fn test_file_does_not_contain_plaintext() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("keyring.vault");
        let passwords = CountingPassword::new("pw");

        FileKeyring::new(path.clone(), test_kdf(), &passwords)
            .set(item("sysA", "pfx@ep1", "very-secret-material"))
            .unwrap();

        let raw = fs::read(&path).unwrap();
        let needle = b"very-secret-material";
        assert!(!raw.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn test_overwrite_is_upsert() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("keyring.vault");
        let passwords = CountingPassword::new("pw");

        FileKeyring::new(path.clone(), test_kdf(), &passwords)
            .set(item("sysA", "@ep1", "old"))
            .unwrap();
        FileKeyring::new(path.clone(), test_kdf(), &passwords)
            .set(item("sysA", "@ep2", "new"))
            .unwrap();

        let mut keyring = FileKeyring::new(path, test_kdf(), &passwords);
        assert_eq!(keyring.keys().unwrap(), vec!["sysA"]);
        assert_eq!(keyring.get("sysA").unwrap().data, "new");
    }

    #[test]
    fn test_remove() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("keyring.vault");
        let passwords = CountingPassword::new("pw");

        FileKeyring::new(path.clone(), test_kdf(), &passwords)
            .set(item("sysA", "@ep1", "secX"))
            .unwrap();
        FileKeyring::new(path.clone(), test_kdf(), &passwords)
            .remove("sysA")
            .unwrap();

        let mut keyring = FileKeyring::new(path, test_kdf(), &passwords);
        assert!(keyring.keys().unwrap().is_empty());
        assert!(matches!(
            keyring.remove("sysA"),
            Err(KeyringError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_wrong_password_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("keyring.vault");

        let right = CountingPassword::new("right");
        FileKeyring::new(path.clone(), test_kdf(), &right)
            .set(item("sysA", "@ep1", "secX"))
            .unwrap();

        let wrong = CountingPassword::new("wrong");
        let mut keyring = FileKeyring::new(path, test_kdf(), &wrong);
        assert!(matches!(
            keyring.keys(),
            Err(KeyringError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_reads_file_written_with_other_kdf() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("keyring.vault");
        let passwords = CountingPassword::new("pw");

        let other = KdfParams {
            iterations: 2,
            ..test_kdf()
        };
        FileKeyring::new(path.clone(), other, &passwords)
            .set(item("sysA", "@ep1", "secX"))
            .unwrap();

        let mut keyring = FileKeyring::new(path, test_kdf(), &passwords);
        assert_eq!(keyring.get("sysA").unwrap().data, "secX");
    }

    #[test]
    fn test_hostile_kdf_header_fails_before_prompt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("keyring.vault");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(crate::backend::format::MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&8192u32.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 32 + 12 + 16]);
        fs::write(&path, &bytes).unwrap();

        let passwords = CountingPassword::new("pw");
        let mut keyring = FileKeyring::new(path, test_kdf(), &passwords);
        assert!(matches!(
            keyring.keys(),
            Err(KeyringError::InvalidFormat(_))
        ));
        assert_eq!(passwords.calls.get(), 0);
    }

    #[test]
    fn test_payload_version_checked() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("keyring.vault");

        let plaintext = br#"{"version":2,"items":{}}"#;
        let sealed = crypto::seal(plaintext, "pw", test_kdf()).unwrap();
        fs::write(&path, VaultFile { kdf: test_kdf(), sealed }.to_bytes()).unwrap();

        let passwords = CountingPassword::new("pw");
        let mut keyring = FileKeyring::new(path, test_kdf(), &passwords);
        assert!(matches!(
            keyring.keys(),
            Err(KeyringError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_prompt_error_propagates() {
        struct NoTty;
        impl PasswordSource for NoTty {
            fn password(&self, _prompt: &str) -> Result<Zeroizing<String>, KeyringError> {
                Err(KeyringError::Password(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "no password entered",
                )))
            }
        }

        let temp = TempDir::new().unwrap();
        let mut keyring = FileKeyring::new(temp.path().join("keyring.vault"), test_kdf(), &NoTty);
        assert!(matches!(
            keyring.set(item("sysA", "@ep1", "secX")),
            Err(KeyringError::Password(_))
        ));
        assert!(!temp.path().join("keyring.vault").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("keyring.vault");
        let passwords = CountingPassword::new("pw");
        FileKeyring::new(path.clone(), test_kdf(), &passwords)
            .set(item("sysA", "@ep1", "secX"))
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
