/// Incremental AES-CBC transforms with PKCS#7 padding.
///
/// Input arrives in arbitrary slices; whole blocks are transformed as soon
/// as they are available. The encryptor emits the padding block on `finish`.
/// The decryptor always holds back the last complete block, since only the
/// final block carries padding and it cannot be told apart until EOF.
///
/// Cipher contexts zeroize on drop (`aes`/`cbc` `zeroize` feature) and the
/// buffered bytes live in `Zeroizing`, so dropping a transform at any point
/// releases its state.

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::block_padding::{Pkcs7, RawPadding};
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};

/// AES block size in bytes. Also the IV length.
pub const BLOCK_SIZE: usize = 16;

/// One direction of a block cipher stream.
pub(crate) trait BlockTransform: Send {
    /// Feed input bytes; append any output that is ready to `out`.
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>);

    /// Flush buffered bytes into `out` and consume the transform.
    fn finish(self, out: &mut Vec<u8>) -> CryptoResult<()>;
}

enum CbcEncrypt {
    Aes128(cbc::Encryptor<Aes128>),
    Aes192(cbc::Encryptor<Aes192>),
    Aes256(cbc::Encryptor<Aes256>),
}

enum CbcDecrypt {
    Aes128(cbc::Decryptor<Aes128>),
    Aes192(cbc::Decryptor<Aes192>),
    Aes256(cbc::Decryptor<Aes256>),
}

fn unsupported(key: &[u8]) -> CryptoError {
    CryptoError::KeySizeUnsupported { bits: key.len() * 8 }
}

impl CbcEncrypt {
    fn new(key: &[u8], iv: &[u8]) -> CryptoResult<Self> {
        let cipher = match key.len() {
            16 => Self::Aes128(KeyIvInit::new_from_slices(key, iv).map_err(|_| unsupported(key))?),
            24 => Self::Aes192(KeyIvInit::new_from_slices(key, iv).map_err(|_| unsupported(key))?),
            32 => Self::Aes256(KeyIvInit::new_from_slices(key, iv).map_err(|_| unsupported(key))?),
            _ => return Err(unsupported(key)),
        };
        Ok(cipher)
    }

    /// `buf.len()` must be a multiple of `BLOCK_SIZE`.
    fn encrypt_blocks(&mut self, buf: &mut [u8]) {
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            let block = GenericArray::from_mut_slice(block);
            match self {
                Self::Aes128(c) => c.encrypt_block_mut(block),
                Self::Aes192(c) => c.encrypt_block_mut(block),
                Self::Aes256(c) => c.encrypt_block_mut(block),
            }
        }
    }
}

impl CbcDecrypt {
    fn new(key: &[u8], iv: &[u8]) -> CryptoResult<Self> {
        let cipher = match key.len() {
            16 => Self::Aes128(KeyIvInit::new_from_slices(key, iv).map_err(|_| unsupported(key))?),
            24 => Self::Aes192(KeyIvInit::new_from_slices(key, iv).map_err(|_| unsupported(key))?),
            32 => Self::Aes256(KeyIvInit::new_from_slices(key, iv).map_err(|_| unsupported(key))?),
            _ => return Err(unsupported(key)),
        };
        Ok(cipher)
    }

    /// `buf.len()` must be a multiple of `BLOCK_SIZE`.
    fn decrypt_blocks(&mut self, buf: &mut [u8]) {
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            let block = GenericArray::from_mut_slice(block);
            match self {
                Self::Aes128(c) => c.decrypt_block_mut(block),
                Self::Aes192(c) => c.decrypt_block_mut(block),
                Self::Aes256(c) => c.decrypt_block_mut(block),
            }
        }
    }
}

pub(crate) struct Encryptor {
    cipher: CbcEncrypt,
    pending: Zeroizing<Vec<u8>>,
}

impl Encryptor {
    pub(crate) fn new(key: &[u8], iv: &[u8]) -> CryptoResult<Self> {
        Ok(Self {
            cipher: CbcEncrypt::new(key, iv)?,
            pending: Zeroizing::new(Vec::with_capacity(BLOCK_SIZE)),
        })
    }
}

impl BlockTransform for Encryptor {
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.pending.extend_from_slice(input);
        let ready = self.pending.len() - self.pending.len() % BLOCK_SIZE;
        if ready == 0 {
            return;
        }

        let start = out.len();
        out.extend_from_slice(&self.pending[..ready]);
        self.pending.drain(..ready);
        self.cipher.encrypt_blocks(&mut out[start..]);
    }

    fn finish(mut self, out: &mut Vec<u8>) -> CryptoResult<()> {
        // Always one padding block: 1..=16 bytes of padding.
        let mut block = Zeroizing::new([0u8; BLOCK_SIZE]);
        let pos = self.pending.len();
        block[..pos].copy_from_slice(&self.pending);
        Pkcs7::raw_pad(&mut block[..], pos);
        self.cipher.encrypt_blocks(&mut block[..]);
        out.extend_from_slice(&block[..]);
        Ok(())
    }
}

pub(crate) struct Decryptor {
    cipher: CbcDecrypt,
    pending: Zeroizing<Vec<u8>>,
}

impl Decryptor {
    pub(crate) fn new(key: &[u8], iv: &[u8]) -> CryptoResult<Self> {
        Ok(Self {
            cipher: CbcDecrypt::new(key, iv)?,
            pending: Zeroizing::new(Vec::with_capacity(2 * BLOCK_SIZE)),
        })
    }
}

impl BlockTransform for Decryptor {
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.pending.extend_from_slice(input);
        if self.pending.len() <= BLOCK_SIZE {
            return;
        }

        // Largest block multiple strictly below the buffered length.
        let ready = (self.pending.len() - 1) / BLOCK_SIZE * BLOCK_SIZE;
        let start = out.len();
        out.extend_from_slice(&self.pending[..ready]);
        self.pending.drain(..ready);
        self.cipher.decrypt_blocks(&mut out[start..]);
    }

    fn finish(mut self, out: &mut Vec<u8>) -> CryptoResult<()> {
        if self.pending.len() != BLOCK_SIZE {
            return Err(CryptoError::InvalidCiphertext);
        }

        self.cipher.decrypt_blocks(&mut self.pending[..]);
        let plain = Pkcs7::raw_unpad(&self.pending).map_err(|_| CryptoError::InvalidCiphertext)?;
        out.extend_from_slice(plain);
        Ok(())
    }
}
