//! Environment access behind a trait so lookups can be faked in tests.

use std::env;

/// Environment variable overriding the encrypted-file keyring password.
pub const KEYRING_PASSWORD_VAR: &str = "ZED_KEYRING_PASSWORD";

/// Environment variable selecting the keyring backend (`auto`, `native`, `file`).
pub const KEYRING_BACKEND_VAR: &str = "ZED_KEYRING_BACKEND";

/// Environment variable overriding the local configuration directory.
pub const CONFIG_DIR_VAR: &str = "ZED_CONFIG_DIR";

pub trait ReadEnv {
    fn var(&self, key: &str) -> Result<String, env::VarError>;
}

/// Delegates to `std::env`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    #[inline]
    fn var(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }
}

impl<E: ReadEnv + ?Sized> ReadEnv for &E {
    fn var(&self, key: &str) -> Result<String, env::VarError> {
        (**self).var(key)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MapEnv;
    use super::*;

    #[test]
    fn test_system_env_delegation() {
        let std_result = std::env::var("PATH");
        let provider_result = SystemEnv.var("PATH");
        assert_eq!(std_result.is_ok(), provider_result.is_ok());
    }

    #[test]
    fn test_map_env_lookup() {
        let env = MapEnv::default().with(KEYRING_PASSWORD_VAR, "hunter2");
        assert_eq!(env.var(KEYRING_PASSWORD_VAR).unwrap(), "hunter2");
        assert!(matches!(
            env.var(KEYRING_BACKEND_VAR),
            Err(env::VarError::NotPresent)
        ));
    }
}
