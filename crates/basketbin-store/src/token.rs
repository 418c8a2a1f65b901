//! Basket ownership tokens

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use subtle::ConstantTimeEq;
use thiserror::Error;

const TOKEN_PREFIX: &str = "bkt";
const TOKEN_ENTROPY_BYTES: usize = 32;

/// Opaque bearer token proving ownership of a basket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Compare against a presented token in constant time
    pub fn matches(&self, presented: &str) -> bool {
        !presented.is_empty() && bool::from(self.0.as_bytes().ct_eq(presented.as_bytes()))
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid token format")]
    InvalidFormat,

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),
}

/// Token generator
pub struct TokenGenerator;

impl TokenGenerator {
    /// Generate a random token: `bkt_` followed by 32 random bytes
    pub fn generate() -> Token {
        let entropy: [u8; TOKEN_ENTROPY_BYTES] = rand::random();

        Token(format!("{}_{}", TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(entropy)))
    }

    /// Validate token format (prefix and payload encoding)
    pub fn validate_format(token: &Token) -> Result<(), TokenError> {
        let payload = token
            .0
            .strip_prefix(TOKEN_PREFIX)
            .and_then(|rest| rest.strip_prefix('_'))
            .ok_or(TokenError::InvalidFormat)?;

        let decoded = URL_SAFE_NO_PAD.decode(payload)?;
        if decoded.len() != TOKEN_ENTROPY_BYTES {
            return Err(TokenError::InvalidFormat);
        }

        Ok(())
    }
}
