//! Keyring label packing and API token splitting

/// Separates the credential prefix from the endpoint in a label
const LABEL_DELIMITER: char = '@';

/// Separates the credential-class prefix from the secret in an API token
const TOKEN_DELIMITER: char = '_';

/// Pack a token prefix and endpoint into a keyring label: `prefix@endpoint`.
pub fn encode_label(prefix: &str, endpoint: &str) -> String {
    format!("{}{}{}", prefix, LABEL_DELIMITER, endpoint)
}

/// Unpack a keyring label into `(prefix, endpoint)`.
///
/// Labels without exactly one `@` (older or foreign entries) are treated as a
/// bare endpoint with an empty prefix.
pub fn decode_label(label: &str) -> (String, String) {
    let mut parts = label.split(LABEL_DELIMITER);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(prefix), Some(endpoint), None) => (prefix.to_string(), endpoint.to_string()),
        _ => (String::new(), label.to_string()),
    }
}

/// Split an API token into `(prefix, secret)` at the last `_`.
pub fn split_api_token(token: &str) -> (String, String) {
    match token.rsplit_once(TOKEN_DELIMITER) {
        Some((prefix, secret)) => (prefix.to_string(), secret.to_string()),
        None => (String::new(), token.to_string()),
    }
}
