/// RSA key material and keypair generation.
///
/// A keypair is exported as two immutable views. `PublicKeyParameters` holds
/// the modulus and public exponent and can be handed out freely;
/// `PrivateKeyParameters` holds every field and always carries its public view.
/// Both keep the exact transfer-form bytes they were built from, so exporting
/// a view reproduces its input byte for byte.
///
/// Generated private fields follow the fixed-width big-endian layout:
/// `privateExponent` is padded to the modulus length, the primes and CRT
/// values to half of it.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use courier_types::RsaParameters;
use rand_core::{OsRng, RngCore};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use zeroize::Zeroizing;

use crate::config::CryptoConfig;
use crate::error::{CryptoError, CryptoResult};
use crate::key_size::RSA_MODULUS_SIZES;

/// Modulus size used when the caller does not pick one.
pub const DEFAULT_MODULUS_BITS: usize = 2048;

/// Random bytes behind a generated symmetric secret. Base64 turns 24 bytes
/// into 32 characters, exactly one AES-256 key.
const SYMMETRIC_SECRET_BYTES: usize = 24;

/// Public half of an RSA keypair.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "RsaParameters", into = "RsaParameters")]
pub struct PublicKeyParameters {
    key: RsaPublicKey,
    wire: RsaParameters,
}

/// Private half of an RSA keypair, including its public view.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "RsaParameters", into = "RsaParameters")]
pub struct PrivateKeyParameters {
    key: RsaPrivateKey,
    public: PublicKeyParameters,
    wire: RsaParameters,
}

/// Both views from one generation call.
#[derive(Clone)]
pub struct KeyPair {
    public: PublicKeyParameters,
    private: PrivateKeyParameters,
}

fn to_fixed_be(value: &BigUint, len: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    if bytes.len() >= len {
        return bytes;
    }
    let mut out = vec![0u8; len - bytes.len()];
    out.extend_from_slice(&bytes);
    out
}

fn required(field: &Option<Vec<u8>>, name: &'static str) -> CryptoResult<BigUint> {
    field
        .as_deref()
        .filter(|bytes| !bytes.is_empty())
        .map(BigUint::from_bytes_be)
        .ok_or(CryptoError::InvalidKeyParameters(name))
}

impl PublicKeyParameters {
    fn from_parts(key: RsaPublicKey, wire: RsaParameters) -> Self {
        Self { key, wire }
    }

    pub(crate) fn rsa(&self) -> &RsaPublicKey {
        &self.key
    }

    /// Modulus length in bytes; also the length of every wrapped secret.
    pub fn modulus_len(&self) -> usize {
        self.key.size()
    }

    pub fn modulus_bits(&self) -> usize {
        self.key.n().bits()
    }

    pub fn modulus(&self) -> &[u8] {
        &self.wire.modulus
    }

    pub fn public_exponent(&self) -> &[u8] {
        &self.wire.public_exponent
    }

    /// Hex SHA-256 over the canonical modulus and exponent.
    ///
    /// Leading zero bytes in the transfer form do not change it.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.key.n().to_bytes_be());
        hasher.update(self.key.e().to_bytes_be());
        hex::encode(hasher.finalize())
    }

    pub fn to_params(&self) -> RsaParameters {
        self.wire.clone()
    }
}

impl PrivateKeyParameters {
    /// Export a freshly generated key in the fixed-width layout.
    fn from_generated(key: RsaPrivateKey) -> CryptoResult<Self> {
        let [p, q] = key.primes() else {
            return Err(CryptoError::InvalidKeyParameters("expected exactly two primes"));
        };
        let one = BigUint::from(1u8);
        let dp = key.d() % &(p - &one);
        let dq = key.d() % &(q - &one);
        let qinv = key
            .crt_coefficient()
            .ok_or(CryptoError::InvalidKeyParameters("no CRT coefficient"))?;

        let len = key.size();
        let half = len.div_ceil(2);
        let wire = RsaParameters {
            modulus: key.n().to_bytes_be(),
            public_exponent: key.e().to_bytes_be(),
            private_exponent: Some(to_fixed_be(key.d(), len)),
            prime_p: Some(to_fixed_be(p, half)),
            prime_q: Some(to_fixed_be(q, half)),
            exponent_dp: Some(to_fixed_be(&dp, half)),
            exponent_dq: Some(to_fixed_be(&dq, half)),
            coefficient_inverse_q: Some(to_fixed_be(&qinv, half)),
        };

        let public = PublicKeyParameters::from_parts(key.to_public_key(), wire.to_public());
        Ok(Self { key, public, wire })
    }

    pub(crate) fn rsa(&self) -> &RsaPrivateKey {
        &self.key
    }

    /// The matching public view.
    pub fn public(&self) -> &PublicKeyParameters {
        &self.public
    }

    pub fn to_params(&self) -> RsaParameters {
        self.wire.clone()
    }
}

impl KeyPair {
    pub fn public(&self) -> &PublicKeyParameters {
        &self.public
    }

    pub fn private(&self) -> &PrivateKeyParameters {
        &self.private
    }

    pub fn into_parts(self) -> (PublicKeyParameters, PrivateKeyParameters) {
        (self.public, self.private)
    }
}

// -- Transfer form --

impl TryFrom<&RsaParameters> for PublicKeyParameters {
    type Error = CryptoError;

    /// Private fields, if any, are ignored.
    fn try_from(params: &RsaParameters) -> CryptoResult<Self> {
        if params.modulus.is_empty() {
            return Err(CryptoError::InvalidKeyParameters("missing modulus"));
        }
        if params.public_exponent.is_empty() {
            return Err(CryptoError::InvalidKeyParameters("missing public exponent"));
        }

        let n = BigUint::from_bytes_be(&params.modulus);
        let e = BigUint::from_bytes_be(&params.public_exponent);
        let key = RsaPublicKey::new_with_max_size(n, e, RSA_MODULUS_SIZES.max_bits)
            .map_err(|_| CryptoError::InvalidKeyParameters("invalid public key"))?;
        Ok(Self::from_parts(key, params.to_public()))
    }
}

impl TryFrom<RsaParameters> for PublicKeyParameters {
    type Error = CryptoError;

    fn try_from(params: RsaParameters) -> CryptoResult<Self> {
        Self::try_from(&params)
    }
}

impl TryFrom<&RsaParameters> for PrivateKeyParameters {
    type Error = CryptoError;

    /// All eight fields are required and the CRT values must agree with
    /// `privateExponent`, `primeP` and `primeQ`.
    fn try_from(params: &RsaParameters) -> CryptoResult<Self> {
        let public = PublicKeyParameters::try_from(params)?;
        let d = required(&params.private_exponent, "missing private exponent")?;
        let p = required(&params.prime_p, "missing prime P")?;
        let q = required(&params.prime_q, "missing prime Q")?;
        let dp = required(&params.exponent_dp, "missing exponent DP")?;
        let dq = required(&params.exponent_dq, "missing exponent DQ")?;
        let qinv = required(&params.coefficient_inverse_q, "missing coefficient InverseQ")?;

        let key = RsaPrivateKey::from_components(
            public.key.n().clone(),
            public.key.e().clone(),
            d,
            vec![p, q],
        )
        .map_err(|_| CryptoError::InvalidKeyParameters("inconsistent private key"))?;
        key.validate()
            .map_err(|_| CryptoError::InvalidKeyParameters("inconsistent private key"))?;

        let [p, q] = key.primes() else {
            return Err(CryptoError::InvalidKeyParameters("expected exactly two primes"));
        };
        let one = BigUint::from(1u8);
        if dp != key.d() % &(p - &one) || dq != key.d() % &(q - &one) {
            return Err(CryptoError::InvalidKeyParameters("CRT exponents do not match"));
        }
        if key.crt_coefficient().as_ref() != Some(&qinv) {
            return Err(CryptoError::InvalidKeyParameters("CRT coefficient does not match"));
        }

        Ok(Self { key, public, wire: params.clone() })
    }
}

impl TryFrom<RsaParameters> for PrivateKeyParameters {
    type Error = CryptoError;

    fn try_from(params: RsaParameters) -> CryptoResult<Self> {
        Self::try_from(&params)
    }
}

impl From<&PublicKeyParameters> for RsaParameters {
    fn from(key: &PublicKeyParameters) -> Self {
        key.to_params()
    }
}

impl From<PublicKeyParameters> for RsaParameters {
    fn from(key: PublicKeyParameters) -> Self {
        key.to_params()
    }
}

impl From<&PrivateKeyParameters> for RsaParameters {
    fn from(key: &PrivateKeyParameters) -> Self {
        key.to_params()
    }
}

impl From<PrivateKeyParameters> for RsaParameters {
    fn from(key: PrivateKeyParameters) -> Self {
        key.to_params()
    }
}

impl PartialEq for PublicKeyParameters {
    fn eq(&self, other: &Self) -> bool {
        self.wire == other.wire
    }
}

impl Eq for PublicKeyParameters {}

impl PartialEq for PrivateKeyParameters {
    fn eq(&self, other: &Self) -> bool {
        self.wire == other.wire
    }
}

impl Eq for PrivateKeyParameters {}

impl fmt::Debug for PublicKeyParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeyParameters")
            .field("bits", &self.modulus_bits())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl fmt::Debug for PrivateKeyParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyParameters")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair").field("public", &self.public).finish_non_exhaustive()
    }
}

// -- Generation --

/// Produces RSA keypairs of a fixed modulus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPairGenerator {
    bits: usize,
}

impl Default for KeyPairGenerator {
    fn default() -> Self {
        Self { bits: DEFAULT_MODULUS_BITS }
    }
}

impl KeyPairGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Modulus sizes run from 1024 to 16384 bits in 8-bit steps.
    pub fn with_bits(bits: usize) -> CryptoResult<Self> {
        if !RSA_MODULUS_SIZES.contains(bits) {
            return Err(CryptoError::KeySizeUnsupported { bits });
        }
        Ok(Self { bits })
    }

    pub fn from_config(config: &CryptoConfig) -> CryptoResult<Self> {
        Self::with_bits(config.modulus_bits)
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    /// Generate a fresh keypair from the OS random source.
    ///
    /// Provider failures come back as `KeyGenerationFailed`; nothing is retried.
    pub fn generate(&self) -> CryptoResult<KeyPair> {
        let key = RsaPrivateKey::new(&mut OsRng, self.bits).map_err(CryptoError::KeyGenerationFailed)?;
        let private = PrivateKeyParameters::from_generated(key)?;
        let public = private.public().clone();

        info!(
            bits = self.bits,
            fingerprint = %public.fingerprint(),
            "Generated RSA keypair"
        );
        Ok(KeyPair { public, private })
    }
}

/// Generate a random printable symmetric secret.
///
/// 32 base64 characters: a full AES-256 key with no padding, and small
/// enough to wrap under any supported modulus.
pub fn generate_symmetric_secret() -> Zeroizing<String> {
    let mut bytes = Zeroizing::new([0u8; SYMMETRIC_SECRET_BYTES]);
    OsRng.fill_bytes(&mut bytes[..]);
    Zeroizing::new(BASE64.encode(&bytes[..]))
}
