/// Bulk encryption of byte streams with a shared secret.
///
/// The secret is padded to a legal AES key (see `key_size`) and the first
/// 16 bytes of that same key are used as the CBC IV.
///
/// **Key reuse as IV.** Every stream encrypted under one secret starts from
/// the same IV, so equal plaintext prefixes produce equal ciphertext
/// prefixes. Existing ciphertext depends on this layout; changing it breaks
/// decryption of everything already written.
///
/// Output is raw AES-CBC ciphertext with PKCS#7 padding and no header. The
/// caller's streams are borrowed or handed back, never closed.

use std::fmt;
use std::io::{self, ErrorKind, Read, Write};

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::block::{BLOCK_SIZE, BlockTransform, Decryptor, Encryptor};
use crate::config::{CryptoConfig, DEFAULT_STREAM_BUFFER_BYTES};
use crate::error::{CryptoError, CryptoResult};
use crate::key_size::{AES_KEY_SIZES, derive_legal_key};

/// Symmetric stream encryption under a key derived from a shared secret.
pub struct StreamCipher {
    key: Zeroizing<Vec<u8>>,
    buffer_size: usize,
}

impl fmt::Debug for StreamCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCipher")
            .field("key_bits", &(self.key.len() * 8))
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

/// Byte counts of one stream transform.
#[derive(Debug, Clone, Copy, Default)]
struct Pumped {
    read: u64,
    written: u64,
}

impl StreamCipher {
    /// Derive the key for `secret`. Secrets longer than 32 UTF-8 bytes are
    /// `KeySizeUnsupported`.
    pub fn new(secret: &str) -> CryptoResult<Self> {
        Self::with_buffer_size(secret, DEFAULT_STREAM_BUFFER_BYTES)
    }

    pub fn with_config(secret: &str, config: &CryptoConfig) -> CryptoResult<Self> {
        Self::with_buffer_size(secret, config.stream_buffer_bytes)
    }

    fn with_buffer_size(secret: &str, buffer_size: usize) -> CryptoResult<Self> {
        let key = derive_legal_key(secret, Some(AES_KEY_SIZES))?;
        Ok(Self { key, buffer_size: buffer_size.max(1) })
    }

    /// Derived key length in bytes (16, 24 or 32).
    pub fn key_len(&self) -> usize {
        self.key.len()
    }

    fn iv(&self) -> &[u8] {
        &self.key[..BLOCK_SIZE]
    }

    fn encryptor(&self) -> CryptoResult<Encryptor> {
        Encryptor::new(&self.key, self.iv())
    }

    fn decryptor(&self) -> CryptoResult<Decryptor> {
        Decryptor::new(&self.key, self.iv())
    }

    /// Encrypt everything from the current position of `plain_in` to its end
    /// into `cipher_out`, padding included. Returns the plaintext byte count.
    pub fn encrypt_stream<R, W>(&self, plain_in: &mut R, cipher_out: &mut W) -> CryptoResult<u64>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        let pumped = pump(self.encryptor()?, plain_in, cipher_out, self.buffer_size)?;
        debug!(plaintext_bytes = pumped.read, ciphertext_bytes = pumped.written, "Encrypted stream");
        Ok(pumped.read)
    }

    /// Decrypt everything from the current position of `cipher_in` to its end
    /// into `plain_out`. Returns the plaintext byte count.
    ///
    /// Empty input, a length that is not a whole number of blocks, or bad
    /// padding is `InvalidCiphertext`. Plaintext ahead of the final block may
    /// already have been written when that happens.
    pub fn decrypt_stream<R, W>(&self, cipher_in: &mut R, plain_out: &mut W) -> CryptoResult<u64>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        let pumped = pump(self.decryptor()?, cipher_in, plain_out, self.buffer_size)
            .inspect_err(log_decrypt_failure)?;
        debug!(ciphertext_bytes = pumped.read, plaintext_bytes = pumped.written, "Decrypted stream");
        Ok(pumped.written)
    }

    /// Async `encrypt_stream`. Suspends only on reads and writes.
    #[cfg(feature = "async")]
    pub async fn encrypt_stream_async<R, W>(
        &self,
        plain_in: &mut R,
        cipher_out: &mut W,
    ) -> CryptoResult<u64>
    where
        R: tokio::io::AsyncRead + Unpin + ?Sized,
        W: tokio::io::AsyncWrite + Unpin + ?Sized,
    {
        let pumped = pump_async(self.encryptor()?, plain_in, cipher_out, self.buffer_size).await?;
        debug!(plaintext_bytes = pumped.read, ciphertext_bytes = pumped.written, "Encrypted stream");
        Ok(pumped.read)
    }

    /// Async `decrypt_stream`. Suspends only on reads and writes.
    #[cfg(feature = "async")]
    pub async fn decrypt_stream_async<R, W>(
        &self,
        cipher_in: &mut R,
        plain_out: &mut W,
    ) -> CryptoResult<u64>
    where
        R: tokio::io::AsyncRead + Unpin + ?Sized,
        W: tokio::io::AsyncWrite + Unpin + ?Sized,
    {
        let pumped = pump_async(self.decryptor()?, cipher_in, plain_out, self.buffer_size)
            .await
            .inspect_err(log_decrypt_failure)?;
        debug!(ciphertext_bytes = pumped.read, plaintext_bytes = pumped.written, "Decrypted stream");
        Ok(pumped.written)
    }

    /// Wrap `inner` so bytes written to it are encrypted on the way through.
    /// Call [`EncryptWriter::finish`] to emit the padding block.
    pub fn encrypt_writer<W: Write>(&self, inner: W) -> CryptoResult<EncryptWriter<W>> {
        Ok(EncryptWriter {
            inner,
            transform: self.encryptor()?,
            out: Vec::with_capacity(self.buffer_size + BLOCK_SIZE),
            failed: false,
        })
    }

    /// Wrap `inner` so reads return decrypted bytes.
    pub fn decrypt_reader<R: Read>(&self, inner: R) -> CryptoResult<DecryptReader<R>> {
        Ok(DecryptReader {
            inner,
            transform: Some(self.decryptor()?),
            buf: Zeroizing::new(vec![0u8; self.buffer_size]),
            ready: Zeroizing::new(Vec::with_capacity(self.buffer_size + BLOCK_SIZE)),
            offset: 0,
            failed: false,
        })
    }
}

fn log_decrypt_failure(err: &CryptoError) {
    if matches!(err, CryptoError::InvalidCiphertext) {
        warn!("Stream ciphertext is malformed");
    }
}

/// Read `input` to EOF through `transform` into `output`.
fn pump<T, R, W>(mut transform: T, input: &mut R, output: &mut W, buffer_size: usize) -> CryptoResult<Pumped>
where
    T: BlockTransform,
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = Zeroizing::new(vec![0u8; buffer_size]);
    let mut out = Zeroizing::new(Vec::with_capacity(buffer_size + BLOCK_SIZE));
    let mut pumped = Pumped::default();

    loop {
        let n = match input.read(&mut buf[..]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        pumped.read += n as u64;

        transform.update(&buf[..n], &mut out);
        output.write_all(&out)?;
        pumped.written += out.len() as u64;
        out.clear();
    }

    transform.finish(&mut out)?;
    output.write_all(&out)?;
    pumped.written += out.len() as u64;
    output.flush()?;
    Ok(pumped)
}

#[cfg(feature = "async")]
async fn pump_async<T, R, W>(
    mut transform: T,
    input: &mut R,
    output: &mut W,
    buffer_size: usize,
) -> CryptoResult<Pumped>
where
    T: BlockTransform,
    R: tokio::io::AsyncRead + Unpin + ?Sized,
    W: tokio::io::AsyncWrite + Unpin + ?Sized,
{
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut buf = Zeroizing::new(vec![0u8; buffer_size]);
    let mut out = Zeroizing::new(Vec::with_capacity(buffer_size + BLOCK_SIZE));
    let mut pumped = Pumped::default();

    loop {
        let n = match input.read(&mut buf[..]).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        pumped.read += n as u64;

        transform.update(&buf[..n], &mut out);
        output.write_all(&out).await?;
        pumped.written += out.len() as u64;
        out.clear();
    }

    transform.finish(&mut out)?;
    output.write_all(&out).await?;
    pumped.written += out.len() as u64;
    output.flush().await?;
    Ok(pumped)
}

/// `Write` adapter that encrypts into an inner writer.
///
/// Dropping it without `finish` leaves the output without its final block.
/// Once a write to the inner writer fails the output is incomplete, and
/// every later `write` and `finish` fails too.
pub struct EncryptWriter<W: Write> {
    inner: W,
    transform: Encryptor,
    out: Vec<u8>,
    failed: bool,
}

fn writer_failed() -> io::Error {
    io::Error::other("earlier write to the inner writer failed")
}

impl<W: Write> EncryptWriter<W> {
    /// Write the padding block, flush, and hand back the inner writer.
    pub fn finish(self) -> CryptoResult<W> {
        let Self { mut inner, transform, mut out, failed } = self;
        if failed {
            return Err(writer_failed().into());
        }
        out.clear();
        transform.finish(&mut out)?;
        inner.write_all(&out)?;
        inner.flush()?;
        Ok(inner)
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write> Write for EncryptWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.failed {
            return Err(writer_failed());
        }
        self.out.clear();
        self.transform.update(buf, &mut self.out);
        if let Err(e) = self.inner.write_all(&self.out) {
            self.failed = true;
            return Err(e);
        }
        Ok(buf.len())
    }

    /// Flushes whole blocks only; a trailing partial block stays buffered
    /// until `finish`.
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// `Read` adapter that decrypts from an inner reader.
///
/// Malformed ciphertext surfaces as `ErrorKind::InvalidData` wrapping
/// `CryptoError::InvalidCiphertext`, on that read and every one after it.
pub struct DecryptReader<R: Read> {
    inner: R,
    transform: Option<Decryptor>,
    buf: Zeroizing<Vec<u8>>,
    ready: Zeroizing<Vec<u8>>,
    offset: usize,
    failed: bool,
}

impl<R: Read> DecryptReader<R> {
    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn into_io(err: CryptoError) -> io::Error {
    match err {
        CryptoError::Io(e) => e,
        other => io::Error::new(ErrorKind::InvalidData, other),
    }
}

impl<R: Read> Read for DecryptReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.failed {
            return Err(into_io(CryptoError::InvalidCiphertext));
        }
        if out.is_empty() {
            return Ok(0);
        }

        while self.offset == self.ready.len() {
            let Some(mut transform) = self.transform.take() else {
                return Ok(0);
            };
            self.ready.clear();
            self.offset = 0;

            let n = match self.inner.read(&mut self.buf[..]) {
                Ok(n) => n,
                Err(e) => {
                    self.transform = Some(transform);
                    return Err(e);
                }
            };
            if n == 0 {
                if let Err(e) = transform.finish(&mut self.ready) {
                    self.failed = true;
                    self.ready.clear();
                    return Err(into_io(e));
                }
            } else {
                transform.update(&self.buf[..n], &mut self.ready);
                self.transform = Some(transform);
            }
        }

        let n = out.len().min(self.ready.len() - self.offset);
        out[..n].copy_from_slice(&self.ready[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}
