/// Legal key size negotiation.
///
/// A cipher declares the key lengths it accepts as `{min, max, skip}` in bits.
/// A caller secret is mapped to the smallest legal length that covers it and
/// right-padded with spaces to that length. The mapping depends only on the
/// declared sizes, so another block cipher can be dropped in by declaring its
/// own `KeySizes`.

use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};

/// Byte used to pad a short secret up to a legal key length.
pub const KEY_PAD_BYTE: u8 = b' ';

/// Key sizes a scheme accepts, in bits: `min_bits`, then every `skip_bits`
/// step up to and including `max_bits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySizes {
    pub min_bits: usize,
    pub max_bits: usize,
    pub skip_bits: usize,
}

/// AES (Rijndael with a 128-bit block): 128, 192 or 256 bit keys.
pub const AES_KEY_SIZES: KeySizes = KeySizes::new(128, 256, 64);

/// RSA moduli the key generator accepts.
pub const RSA_MODULUS_SIZES: KeySizes = KeySizes::new(1024, 16384, 8);

impl KeySizes {
    pub const fn new(min_bits: usize, max_bits: usize, skip_bits: usize) -> Self {
        Self { min_bits, max_bits, skip_bits }
    }

    /// Whether `bits` is one of the declared sizes.
    pub fn contains(&self, bits: usize) -> bool {
        if bits < self.min_bits || bits > self.max_bits {
            return false;
        }
        match self.skip_bits {
            0 => bits == self.min_bits,
            skip => (bits - self.min_bits) % skip == 0,
        }
    }
}

/// Byte length of the key derived from a `secret_len`-byte secret.
///
/// Returns `Ok(None)` when the scheme declares no sizes, meaning the secret
/// bytes are used as they are.
pub fn target_key_len(sizes: Option<KeySizes>, secret_len: usize) -> CryptoResult<Option<usize>> {
    let Some(sizes) = sizes else {
        return Ok(None);
    };

    let wanted_bits = secret_len.saturating_mul(8);
    let mut bits = sizes.min_bits;
    while wanted_bits > bits && bits <= sizes.max_bits && sizes.skip_bits > 0 {
        bits += sizes.skip_bits;
    }

    if wanted_bits > bits || bits > sizes.max_bits {
        return Err(CryptoError::KeySizeUnsupported { bits: wanted_bits });
    }
    Ok(Some(bits / 8))
}

/// Derive the raw key bytes for `secret` under the declared sizes.
pub fn derive_legal_key(secret: &str, sizes: Option<KeySizes>) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let mut key = Zeroizing::new(secret.as_bytes().to_vec());
    if let Some(len) = target_key_len(sizes, key.len())? {
        key.resize(len, KEY_PAD_BYTE);
    }
    Ok(key)
}
