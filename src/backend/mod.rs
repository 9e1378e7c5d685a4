//! Secure storage backends
//!
//! Items are stored in the OS keychain when the platform has one, falling back
//! to a password-encrypted file under the local configuration directory.
//! A handle is opened per operation and dropped when the operation returns.

pub mod crypto;
pub mod file;
pub mod format;
pub mod native;
pub mod password;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::env::{ReadEnv, KEYRING_BACKEND_VAR};
use crate::paths;

pub use crypto::KdfParams;
pub use file::FileKeyring;
pub use native::NativeKeyring;
pub use password::{EnvOrPrompt, PasswordSource};

/// Service name all keychain entries are scoped under
pub const SERVICE_NAME: &str = "zed tokens";

/// Name of the encrypted fallback file inside the config directory
pub const KEYRING_FILENAME: &str = "keyring.vault";

/// Backend errors
#[derive(Debug, thiserror::Error)]
pub enum KeyringError {
    #[error("the specified item could not be found in the keyring: {0}")]
    KeyNotFound(String),

    #[error("key is reserved for keyring bookkeeping: {0}")]
    ReservedKey(String),

    #[error("Keychain error: {0}")]
    Native(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid keyring file magic")]
    InvalidMagic,

    #[error("Invalid keyring file format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported keyring file version: {0}")]
    UnsupportedVersion(u32),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed (wrong password or corrupted data)")]
    DecryptionFailed,

    #[error("Cryptographic error")]
    CryptoError,

    #[error("failed to read keyring password: {0}")]
    Password(std::io::Error),

    #[error("unknown keyring backend {0:?} (expected auto, native or file)")]
    InvalidBackend(String),

    #[error("Failed to determine config directory")]
    NoConfigDir,
}

impl KeyringError {
    /// True when the OS reports that it has no usable secure storage.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(
            self,
            KeyringError::Native(
                keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_)
            )
        )
    }
}

/// One stored record: `key` is the system name, `label` the packed
/// `prefix@endpoint` string, `data` the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Item {
    pub key: String,
    pub label: String,
    pub data: String,
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .finish()
    }
}

/// Operations every backend supports.
///
/// Methods take `&mut self` so a handle can lazily resolve its password and
/// contents once per operation.
pub trait Keyring {
    fn keys(&mut self) -> Result<Vec<String>, KeyringError>;
    fn get(&mut self, key: &str) -> Result<Item, KeyringError>;
    fn set(&mut self, item: Item) -> Result<(), KeyringError>;
    fn remove(&mut self, key: &str) -> Result<(), KeyringError>;
}

/// Which backend to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// OS keychain, or the encrypted file when the OS has none
    #[default]
    Auto,
    Native,
    File,
}

impl FromStr for Backend {
    type Err = KeyringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Backend::Auto),
            "native" | "keychain" => Ok(Backend::Native),
            "file" => Ok(Backend::File),
            other => Err(KeyringError::InvalidBackend(other.to_string())),
        }
    }
}

/// Settings used each time a keyring handle is opened
#[derive(Debug, Clone)]
pub struct KeyringConfig {
    pub service_name: String,
    pub file_path: PathBuf,
    pub backend: Backend,
    /// Argon2id parameters for files written by this process
    pub kdf: KdfParams,
}

impl KeyringConfig {
    /// Build the configuration from the environment and platform directories
    pub fn from_env<E: ReadEnv>(env: &E) -> Result<Self, KeyringError> {
        let backend = match env.var(KEYRING_BACKEND_VAR) {
            Ok(value) => value.parse()?,
            Err(_) => Backend::default(),
        };
        let dir = paths::config_dir(env).ok_or(KeyringError::NoConfigDir)?;

        Ok(Self {
            service_name: SERVICE_NAME.to_string(),
            file_path: dir.join(KEYRING_FILENAME),
            backend,
            kdf: KdfParams::default(),
        })
    }

    /// File-backed configuration at an explicit path (for testing)
    pub fn file(path: PathBuf) -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
            file_path: path,
            backend: Backend::File,
            kdf: KdfParams::default(),
        }
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }
}

/// Open a keyring handle according to `config`.
pub fn open<'a>(
    config: &KeyringConfig,
    passwords: &'a dyn PasswordSource,
) -> Result<Box<dyn Keyring + 'a>, KeyringError> {
    open_with(config, passwords, |service: &str| NativeKeyring::open(service))
}

/// [`open`] with the OS keychain opener supplied by the caller.
pub fn open_with<'a, N, F>(
    config: &KeyringConfig,
    passwords: &'a dyn PasswordSource,
    open_native: F,
) -> Result<Box<dyn Keyring + 'a>, KeyringError>
where
    N: Keyring + 'a,
    F: FnOnce(&str) -> Result<N, KeyringError>,
{
    let open_file = || -> Box<dyn Keyring + 'a> {
        Box::new(FileKeyring::new(
            config.file_path.clone(),
            config.kdf,
            passwords,
        ))
    };

    match config.backend {
        Backend::File => Ok(open_file()),
        Backend::Native => Ok(Box::new(open_native(&config.service_name)?)),
        Backend::Auto => match open_native(&config.service_name) {
            Ok(native) => Ok(Box::new(native)),
            Err(e) if e.is_backend_unavailable() => {
                tracing::debug!(
                    "OS keychain unavailable ({}), using encrypted file {:?}",
                    e,
                    config.file_path
                );
                Ok(open_file())
            }
            Err(e) => Err(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::crypto::test_kdf;
    use crate::backend::native::testing::MemoryCredentials;
    use crate::env::testing::MapEnv;
    use crate::env::{CONFIG_DIR_VAR, KEYRING_PASSWORD_VAR};
    use tempfile::TempDir;

    fn auto_config(dir: &std::path::Path) -> KeyringConfig {
        KeyringConfig {
            backend: Backend::Auto,
            ..KeyringConfig::file(dir.join(KEYRING_FILENAME)).with_kdf(test_kdf())
        }
    }

    fn native_error(
        error: keyring::Error,
    ) -> impl FnOnce(&str) -> Result<NativeKeyring<MemoryCredentials>, KeyringError> {
        move |_: &str| Err(KeyringError::Native(error))
    }

    type ErrorCtor = fn(Box<dyn std::error::Error + Send + Sync>) -> keyring::Error;

    fn unavailable(kind: ErrorCtor) -> keyring::Error {
        kind(Box::new(std::io::Error::new(
            std::io::ErrorKind::Other,
            "no secret service",
        )))
    }

    #[test]
    fn test_auto_falls_back_to_file() {
        for error in [
            unavailable(keyring::Error::NoStorageAccess),
            unavailable(keyring::Error::PlatformFailure),
        ] {
            let temp = TempDir::new().unwrap();
            let passwords =
                EnvOrPrompt::with_env(MapEnv::default().with(KEYRING_PASSWORD_VAR, "pw"));
            let config = auto_config(temp.path());

            let mut ring = open_with(&config, &passwords, native_error(error)).unwrap();
            ring.set(Item {
                key: "sysA".to_string(),
                label: "@ep1".to_string(),
                data: "secX".to_string(),
            })
            .unwrap();
            assert!(config.file_path.exists());
        }
    }

    #[test]
    fn test_auto_propagates_other_keychain_errors() {
        for error in [
            keyring::Error::NoEntry,
            keyring::Error::Invalid("service".to_string(), "empty".to_string()),
        ] {
            let temp = TempDir::new().unwrap();
            let passwords = EnvOrPrompt::with_env(MapEnv::default());
            let config = auto_config(temp.path());

            let result = open_with(&config, &passwords, native_error(error));
            assert!(matches!(result, Err(KeyringError::Native(_))));
            assert!(!config.file_path.exists());
        }
    }

    #[test]
    fn test_auto_prefers_keychain() {
        let temp = TempDir::new().unwrap();
        let passwords = EnvOrPrompt::with_env(MapEnv::default());
        let config = auto_config(temp.path());

        let mut ring = open_with(&config, &passwords, |service: &str| {
            assert_eq!(service, SERVICE_NAME);
            NativeKeyring::with_store(MemoryCredentials::default(), "alice".to_string())
        })
        .unwrap();
        ring.set(Item {
            key: "sysA".to_string(),
            label: "@ep1".to_string(),
            data: "secX".to_string(),
        })
        .unwrap();
        assert_eq!(ring.keys().unwrap(), vec!["sysA"]);
        assert!(!config.file_path.exists());
    }

    #[test]
    fn test_file_backend_skips_keychain() {
        let temp = TempDir::new().unwrap();
        let passwords = EnvOrPrompt::with_env(MapEnv::default());
        let config = KeyringConfig::file(temp.path().join(KEYRING_FILENAME));

        type Opened = Result<NativeKeyring<MemoryCredentials>, KeyringError>;
        let no_keychain = |_: &str| -> Opened {
            panic!("keychain must not be opened for the file backend")
        };

        let mut ring = open_with(&config, &passwords, no_keychain).unwrap();
        assert!(ring.keys().unwrap().is_empty());
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("auto".parse::<Backend>().unwrap(), Backend::Auto);
        assert_eq!("".parse::<Backend>().unwrap(), Backend::Auto);
        assert_eq!("Native".parse::<Backend>().unwrap(), Backend::Native);
        assert_eq!(" file ".parse::<Backend>().unwrap(), Backend::File);
        assert!(matches!(
            "kwallet".parse::<Backend>(),
            Err(KeyringError::InvalidBackend(name)) if name == "kwallet"
        ));
    }

    #[test]
    fn test_config_from_env() {
        let env = MapEnv::default()
            .with(CONFIG_DIR_VAR, "/tmp/zed-cfg")
            .with(KEYRING_BACKEND_VAR, "file");

        let config = KeyringConfig::from_env(&env).unwrap();
        assert_eq!(config.backend, Backend::File);
        assert_eq!(config.service_name, SERVICE_NAME);
        assert_eq!(
            config.file_path,
            PathBuf::from("/tmp/zed-cfg").join(KEYRING_FILENAME)
        );
    }

    #[test]
    fn test_config_rejects_unknown_backend() {
        let env = MapEnv::default()
            .with(CONFIG_DIR_VAR, "/tmp/zed-cfg")
            .with(KEYRING_BACKEND_VAR, "pass");

        assert!(matches!(
            KeyringConfig::from_env(&env),
            Err(KeyringError::InvalidBackend(_))
        ));
    }

    #[test]
    fn test_item_debug_hides_data() {
        let item = Item {
            key: "sysA".to_string(),
            label: "pfx@ep1".to_string(),
            data: "super-secret".to_string(),
        };
        let rendered = format!("{:?}", item);
        assert!(rendered.contains("sysA"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_unavailable_classification() {
        let unavailable = KeyringError::Native(keyring::Error::NoStorageAccess(Box::new(
            std::io::Error::new(std::io::ErrorKind::Other, "no dbus"),
        )));
        assert!(unavailable.is_backend_unavailable());
        assert!(!KeyringError::KeyNotFound("x".into()).is_backend_unavailable());
        assert!(!KeyringError::Native(keyring::Error::NoEntry).is_backend_unavailable());
    }
}
