//! AES-128-CBC envelope used by the Bank Alfalah gateway
//!
//! The gateway authenticates requests with an encrypted field string: the
//! cipher key and the IV are the first 16 bytes of two configured secrets,
//! padding is PKCS#7 and the ciphertext travels as standard base64. There is
//! no separate MAC, so a successful decrypt is the only integrity check.
//!
//! The codec is agnostic of how the plaintext was assembled. Callers build it
//! with the field-set types in [`crate::payments::fields`].

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::payments::error::{PaymentError, PaymentResult};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

pub const SECRET_LEN: usize = 16;

/// Separator for positional (pipe-delimited) field strings
pub const FIELD_SEPARATOR: char = '|';

#[derive(Clone)]
pub struct EnvelopeCodec {
    key: [u8; SECRET_LEN],
    iv: [u8; SECRET_LEN],
}

impl std::fmt::Debug for EnvelopeCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCodec").finish_non_exhaustive()
    }
}

impl EnvelopeCodec {
    /// Builds a codec from the two gateway secrets. Longer secrets are
    /// truncated to 16 bytes, never hashed.
    pub fn new(key_secret: &str, iv_secret: &str) -> Result<Self, SecretError> {
        Ok(Self {
            key: derive_secret("key1", key_secret)?,
            iv: derive_secret("key2", iv_secret)?,
        })
    }

    /// Encrypts `plaintext` and returns the base64 token.
    pub fn encode(&self, plaintext: &str) -> PaymentResult<String> {
        if plaintext.is_empty() {
            return Err(PaymentError::EncryptionError {
                message: "plaintext must not be empty".to_string(),
            });
        }

        let ciphertext = Aes128CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        Ok(STANDARD.encode(ciphertext))
    }

    /// Recovers the plaintext from a base64 token.
    pub fn decode(&self, token: &str) -> PaymentResult<String> {
        // form/query decoding turns '+' into ' '
        let normalized: String = token
            .trim()
            .chars()
            .map(|c| if c == ' ' { '+' } else { c })
            .collect();
        if normalized.is_empty() {
            return Err(PaymentError::DecryptionError {
                message: "token must not be empty".to_string(),
            });
        }

        let ciphertext = STANDARD
            .decode(normalized.as_bytes())
            .map_err(|e| PaymentError::DecryptionError {
                message: format!("token is not valid base64: {}", e),
            })?;

        let plaintext = Aes128CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| PaymentError::DecryptionError {
                message: "bad ciphertext or padding (wrong secrets or tampered data)"
                    .to_string(),
            })?;

        String::from_utf8(plaintext).map_err(|_| PaymentError::DecryptionError {
            message: "decrypted payload is not valid UTF-8".to_string(),
        })
    }

    /// Decodes a token and splits the pipe-delimited plaintext into its
    /// positional fields.
    pub fn decode_fields(&self, token: &str) -> PaymentResult<Vec<String>> {
        let plaintext = self.decode(token)?;
        Ok(split_fields(&plaintext))
    }
}

/// Encrypts with freshly supplied secrets.
pub fn encode(plaintext: &str, key_secret: &str, iv_secret: &str) -> PaymentResult<String> {
    EnvelopeCodec::new(key_secret, iv_secret)
        .map_err(|e| PaymentError::EncryptionError {
            message: e.to_string(),
        })?
        .encode(plaintext)
}

/// Decrypts with freshly supplied secrets.
pub fn decode(token: &str, key_secret: &str, iv_secret: &str) -> PaymentResult<String> {
    EnvelopeCodec::new(key_secret, iv_secret)
        .map_err(|e| PaymentError::DecryptionError {
            message: e.to_string(),
        })?
        .decode(token)
}

pub fn split_fields(plaintext: &str) -> Vec<String> {
    plaintext.split(FIELD_SEPARATOR).map(str::to_string).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretError {
    #[error("{name} is missing")]
    Missing { name: &'static str },
    #[error("{name} must be at least 16 bytes, got {len}")]
    TooShort { name: &'static str, len: usize },
}

/// Checks a secret without building a codec. Used by startup diagnostics.
pub fn validate_secret(name: &'static str, secret: &str) -> Result<(), SecretError> {
    derive_secret(name, secret).map(|_| ())
}

fn derive_secret(name: &'static str, secret: &str) -> Result<[u8; SECRET_LEN], SecretError> {
    let bytes = secret.as_bytes();
    if bytes.is_empty() {
        return Err(SecretError::Missing { name });
    }
    if bytes.len() < SECRET_LEN {
        return Err(SecretError::TooShort {
            name,
            len: bytes.len(),
        });
    }

    let mut out = [0u8; SECRET_LEN];
    out.copy_from_slice(&bytes[..SECRET_LEN]);
    Ok(out)
}
