//! Error type shared by key generation, wrapping, and stream encryption.
//!
//! Decryption failures carry no detail about which check failed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// The RSA provider could not produce a keypair. Not retried.
    #[error("Key generation failed")]
    KeyGenerationFailed(#[source] rsa::Error),

    /// The secret does not fit under the key's modulus.
    #[error("Secret too large: {len} bytes, limit is {max} bytes for this key")]
    SecretTooLarge { len: usize, max: usize },

    /// A wrapped secret failed to unwrap (wrong key, wrong size, or tampered).
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Symmetric ciphertext is misaligned or its padding is malformed.
    #[error("Invalid ciphertext")]
    InvalidCiphertext,

    /// Requested key length is outside what the scheme accepts.
    #[error("Unsupported key size: {bits} bits")]
    KeySizeUnsupported { bits: usize },

    /// Key parameters are incomplete or inconsistent.
    #[error("Invalid key parameters: {0}")]
    InvalidKeyParameters(&'static str),

    /// Reading from or writing to a caller-supplied stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CryptoError::SecretTooLarge { len: 118, max: 117 };
        assert_eq!(err.to_string(), "Secret too large: 118 bytes, limit is 117 bytes for this key");

        let err = CryptoError::KeySizeUnsupported { bits: 320 };
        assert_eq!(err.to_string(), "Unsupported key size: 320 bits");

        assert_eq!(CryptoError::DecryptionFailed.to_string(), "Decryption failed");
        assert_eq!(CryptoError::InvalidCiphertext.to_string(), "Invalid ciphertext");
        assert_eq!(
            CryptoError::InvalidKeyParameters("missing modulus").to_string(),
            "Invalid key parameters: missing modulus"
        );
    }

    #[test]
    fn key_generation_failure_keeps_provider_source() {
        use std::error::Error as _;

        let err = CryptoError::KeyGenerationFailed(rsa::Error::NprimesTooSmall);
        assert_eq!(err.to_string(), "Key generation failed");
        let source = err.source().expect("provider error as source");
        assert_eq!(source.to_string(), rsa::Error::NprimesTooSmall.to_string());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: CryptoError = io.into();
        assert!(matches!(err, CryptoError::Io(_)));
    }
}
