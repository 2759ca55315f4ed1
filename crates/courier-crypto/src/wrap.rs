/// Wrapping a short secret under an RSA public key.
///
/// Uses PKCS#1 v1.5 encryption padding, not OAEP. The padding string is
/// random, so wrapping the same secret twice gives different bytes; both
/// unwrap to the same secret. Output length always equals the modulus length
/// and carries no framing.

use std::fmt;

use rand_core::OsRng;
use rsa::Pkcs1v15Encrypt;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{PrivateKeyParameters, PublicKeyParameters};

/// Bytes of the modulus consumed by PKCS#1 v1.5 padding.
pub const PKCS1_V15_OVERHEAD: usize = 11;

/// Ciphertext of a wrapped secret, exactly one modulus long.
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedSecret(Vec<u8>);

impl WrappedSecret {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for WrappedSecret {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for WrappedSecret {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for WrappedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WrappedSecret({} bytes)", self.0.len())
    }
}

/// Longest secret, in UTF-8 bytes, that `public` can wrap.
pub fn max_secret_len(public: &PublicKeyParameters) -> usize {
    public.modulus_len().saturating_sub(PKCS1_V15_OVERHEAD)
}

/// Encrypt `secret` under `public`. Only the public fields are used.
pub fn wrap_secret(secret: &str, public: &PublicKeyParameters) -> CryptoResult<WrappedSecret> {
    let len = secret.len();
    let max = max_secret_len(public);
    if len > max {
        return Err(CryptoError::SecretTooLarge { len, max });
    }

    let wrapped = public
        .rsa()
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, secret.as_bytes())
        .map_err(|e| match e {
            rsa::Error::MessageTooLong => CryptoError::SecretTooLarge { len, max },
            _ => CryptoError::InvalidKeyParameters("public key rejected by RSA provider"),
        })?;

    debug!(
        modulus_bytes = public.modulus_len(),
        fingerprint = %public.fingerprint(),
        "Wrapped secret"
    );
    Ok(WrappedSecret(wrapped))
}

/// Recover a secret wrapped under the public half of `private`.
///
/// Any mismatch (length, padding, key, or non UTF-8 content) is
/// `DecryptionFailed`; no partial output is returned.
pub fn unwrap_secret(
    data: impl AsRef<[u8]>,
    private: &PrivateKeyParameters,
) -> CryptoResult<Zeroizing<String>> {
    let data = data.as_ref();
    let public = private.public();
    if data.len() != public.modulus_len() {
        warn!(
            got = data.len(),
            expected = public.modulus_len(),
            "Wrapped secret has wrong length"
        );
        return Err(CryptoError::DecryptionFailed);
    }

    let plain = private
        .rsa()
        .decrypt_blinded(&mut OsRng, Pkcs1v15Encrypt, data)
        .map(Zeroizing::new)
        .map_err(|_| {
            warn!(fingerprint = %public.fingerprint(), "Failed to unwrap secret");
            CryptoError::DecryptionFailed
        })?;

    let secret = std::str::from_utf8(&plain).map_err(|_| CryptoError::DecryptionFailed)?;
    debug!(fingerprint = %public.fingerprint(), "Unwrapped secret");
    Ok(Zeroizing::new(secret.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPairGenerator;
    use crate::testing::test_keypair;

    #[test]
    fn roundtrip() {
        let pair = test_keypair();
        let wrapped = wrap_secret("my-secret-key-123", pair.public()).unwrap();

        assert_eq!(wrapped.len(), pair.public().modulus_len());
        let secret = unwrap_secret(&wrapped, pair.private()).unwrap();
        assert_eq!(secret.as_str(), "my-secret-key-123");
    }

    #[test]
    fn empty_and_multibyte_secrets() {
        let pair = test_keypair();
        for secret in ["", "ключ-🔑", "pa$$word"] {
            let wrapped = wrap_secret(secret, pair.public()).unwrap();
            assert_eq!(unwrap_secret(&wrapped, pair.private()).unwrap().as_str(), secret);
        }
    }

    #[test]
    fn boundary_length() {
        let pair = test_keypair();
        let max = max_secret_len(pair.public());
        assert_eq!(max, 128 - PKCS1_V15_OVERHEAD);

        let fits = "a".repeat(max);
        let wrapped = wrap_secret(&fits, pair.public()).unwrap();
        assert_eq!(unwrap_secret(&wrapped, pair.private()).unwrap().as_str(), fits);

        let too_long = "a".repeat(max + 1);
        let err = wrap_secret(&too_long, pair.public()).unwrap_err();
        assert!(matches!(err, CryptoError::SecretTooLarge { len, max: m } if len == max + 1 && m == max));
    }

    #[test]
    fn limit_counts_utf8_bytes() {
        let pair = test_keypair();
        let max = max_secret_len(pair.public());
        // max - 1 chars, max + 1 bytes
        let secret = format!("{}é", "a".repeat(max - 1));
        assert!(matches!(
            wrap_secret(&secret, pair.public()),
            Err(CryptoError::SecretTooLarge { .. })
        ));
    }

    #[test]
    fn wrapping_is_randomized() {
        let pair = test_keypair();
        let a = wrap_secret("same", pair.public()).unwrap();
        let b = wrap_secret("same", pair.public()).unwrap();

        assert_ne!(a, b);
        assert_eq!(unwrap_secret(&a, pair.private()).unwrap().as_str(), "same");
        assert_eq!(unwrap_secret(&b, pair.private()).unwrap().as_str(), "same");
    }

    #[test]
    fn tampering_never_returns_original() {
        let pair = test_keypair();
        let secret = "my-secret-key-123";
        let wrapped = wrap_secret(secret, pair.public()).unwrap().into_bytes();

        let mut failures = 0;
        for i in 0..wrapped.len() {
            let mut tampered = wrapped.clone();
            tampered[i] ^= 0x01;
            match unwrap_secret(&tampered, pair.private()) {
                Err(CryptoError::DecryptionFailed) => failures += 1,
                Err(other) => panic!("unexpected error: {other}"),
                Ok(recovered) => assert_ne!(recovered.as_str(), secret),
            }
        }
        assert!(failures >= wrapped.len() - 2);
    }

    #[test]
    fn wrong_length_fails() {
        let pair = test_keypair();
        let wrapped = wrap_secret("secret", pair.public()).unwrap().into_bytes();

        let short = &wrapped[..wrapped.len() - 1];
        assert!(matches!(unwrap_secret(short, pair.private()), Err(CryptoError::DecryptionFailed)));

        let mut long = wrapped.clone();
        long.push(0);
        assert!(matches!(unwrap_secret(&long, pair.private()), Err(CryptoError::DecryptionFailed)));

        assert!(matches!(unwrap_secret([0u8; 0], pair.private()), Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn wrong_private_key_never_returns_original() {
        let pair = test_keypair();
        let other = KeyPairGenerator::with_bits(1024).unwrap().generate().unwrap();
        let wrapped = wrap_secret("for pair one only", pair.public()).unwrap();

        match unwrap_secret(&wrapped, other.private()) {
            Ok(recovered) => assert_ne!(recovered.as_str(), "for pair one only"),
            Err(err) => assert!(matches!(err, CryptoError::DecryptionFailed)),
        }
    }

    #[test]
    fn non_utf8_plaintext_fails() {
        let pair = test_keypair();
        let raw = pair
            .public()
            .rsa()
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, &[0xFF, 0xFE, 0xFD])
            .unwrap();

        assert!(matches!(unwrap_secret(&raw, pair.private()), Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn wrapped_secret_conversions() {
        let wrapped = WrappedSecret::from(vec![1, 2, 3]);
        assert_eq!(wrapped.as_bytes(), &[1, 2, 3]);
        assert_eq!(format!("{wrapped:?}"), "WrappedSecret(3 bytes)");
        assert!(!wrapped.is_empty());
        assert_eq!(wrapped.into_bytes(), vec![1, 2, 3]);
    }
}
