/// Courier Crypto Library
///
/// Hybrid encryption in two halves:
/// - RSA keypairs wrap a short shared secret (PKCS#1 v1.5)
/// - The shared secret keys AES-CBC for bulk stream encryption
///
/// Neither half is authenticated. Pair with an out-of-band integrity check
/// when tampering matters.

mod block;

pub mod config;
pub mod error;
pub mod key_size;
pub mod keys;
pub mod stream;
pub mod wrap;

pub use block::BLOCK_SIZE;
pub use config::CryptoConfig;
pub use error::{CryptoError, CryptoResult};
pub use keys::{KeyPair, KeyPairGenerator, PrivateKeyParameters, PublicKeyParameters};
pub use stream::{DecryptReader, EncryptWriter, StreamCipher};
pub use wrap::{WrappedSecret, max_secret_len, unwrap_secret, wrap_secret};
