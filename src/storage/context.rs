//! Effective connection context for a command invocation
//!
//! Explicit flag values win; anything left empty is filled from the token of
//! the current context.

use super::config::{ConfigError, ConfigStore};
use super::token::{Token, TokenStore};
use super::TokenError;

/// The stored token for the current context.
pub fn current_token<C, T>(config_store: &C, token_store: &T) -> Result<Token, TokenError>
where
    C: ConfigStore + ?Sized,
    T: TokenStore + ?Sized,
{
    let config = config_store.get()?;
    token_store.get(&config.current_token)
}

/// Create a Token from input, filling any missing values in with the current
/// context's defaults.
///
/// When all three values are given no configuration or storage is touched.
/// The prefix is never taken from input.
pub fn resolve<C, T>(
    config_store: &C,
    token_store: &T,
    system: &str,
    endpoint: &str,
    secret: &str,
) -> Result<Token, TokenError>
where
    C: ConfigStore + ?Sized,
    T: TokenStore + ?Sized,
{
    if !system.is_empty() && !endpoint.is_empty() && !secret.is_empty() {
        return Ok(Token {
            system: system.to_string(),
            endpoint: endpoint.to_string(),
            prefix: String::new(),
            secret: secret.to_string(),
        });
    }

    let stored = match current_token(config_store, token_store) {
        Ok(token) => token,
        Err(TokenError::Config(ConfigError::NotFound)) => {
            return Err(TokenError::NoCurrentContext)
        }
        Err(e) => return Err(e),
    };

    let token = Token {
        system: default_empty(system, stored.system),
        endpoint: default_empty(endpoint, stored.endpoint),
        prefix: stored.prefix,
        secret: default_empty(secret, stored.secret),
    };
    tracing::debug!("Resolved context: {:?}", token);

    Ok(token)
}

fn default_empty(value: &str, fallback: String) -> String {
    if value.is_empty() {
        fallback
    } else {
        value.to_string()
    }
}
