//! API token entity and the storage capability over it

use std::fmt;

use serde::{Deserialize, Serialize};

use super::TokenError;

/// Placeholder shown instead of secret material when tokens are not revealed
pub const REDACTED_MESSAGE: &str = "<redacted>";

/// An API Token and all of its metadata.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub system: String,
    pub endpoint: String,
    pub prefix: String,
    pub secret: String,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret = if self.secret == REDACTED_MESSAGE {
            REDACTED_MESSAGE
        } else {
            "<hidden>"
        };
        f.debug_struct("Token")
            .field("system", &self.system)
            .field("endpoint", &self.endpoint)
            .field("prefix", &self.prefix)
            .field("secret", &secret)
            .finish()
    }
}

/// TokenStore is anything that can securely persist Tokens, keyed by system.
pub trait TokenStore {
    /// All stored tokens, in backend order. Unless `reveal_tokens` is set,
    /// every secret is replaced by [`REDACTED_MESSAGE`].
    fn list(&self, reveal_tokens: bool) -> Result<Vec<Token>, TokenError>;

    /// Fails with [`TokenError::TokenNotFound`] if nothing is stored for `system`.
    fn get(&self, system: &str) -> Result<Token, TokenError>;

    /// Upsert the token for `system`, splitting the credential prefix off `secret`.
    fn put(&self, system: &str, endpoint: &str, secret: &str) -> Result<(), TokenError>;

    /// Remove the token for `system`.
    ///
    /// A missing entry surfaces the backend's own error rather than
    /// [`TokenError::TokenNotFound`]; callers rely on that distinction.
    fn delete(&self, system: &str) -> Result<(), TokenError>;
}

impl<T: TokenStore + ?Sized> TokenStore for &T {
    fn list(&self, reveal_tokens: bool) -> Result<Vec<Token>, TokenError> {
        (**self).list(reveal_tokens)
    }

    fn get(&self, system: &str) -> Result<Token, TokenError> {
        (**self).get(system)
    }

    fn put(&self, system: &str, endpoint: &str, secret: &str) -> Result<(), TokenError> {
        (**self).put(system, endpoint, secret)
    }

    fn delete(&self, system: &str) -> Result<(), TokenError> {
        (**self).delete(system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_secret() {
        let token = Token {
            system: "sysA".to_string(),
            endpoint: "grpc.example.com:443".to_string(),
            prefix: "tc_zed".to_string(),
            secret: "abcdef0123456789".to_string(),
        };

        let rendered = format!("{:?}", token);
        assert!(rendered.contains("sysA"));
        assert!(rendered.contains("grpc.example.com:443"));
        assert!(!rendered.contains("abcdef0123456789"));
    }

    #[test]
    fn test_equality_is_fieldwise() {
        let a = Token {
            system: "sysA".into(),
            endpoint: "ep1".into(),
            prefix: "".into(),
            secret: "secX".into(),
        };
        let mut b = a.clone();
        assert_eq!(a, b);

        b.prefix = "pfx".into();
        assert_ne!(a, b);
    }
}
