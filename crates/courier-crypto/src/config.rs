use std::env;

use anyhow::{Context, Result, bail};

use crate::key_size::RSA_MODULUS_SIZES;
use crate::keys::DEFAULT_MODULUS_BITS;

/// Stream I/O buffer used when none is configured (64 KB).
pub const DEFAULT_STREAM_BUFFER_BYTES: usize = 64 * 1024;

/// Tunables for key generation and stream encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoConfig {
    /// RSA modulus size for new keypairs.
    pub modulus_bits: usize,
    /// Bytes read from the source stream per step.
    pub stream_buffer_bytes: usize,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            modulus_bits: DEFAULT_MODULUS_BITS,
            stream_buffer_bytes: DEFAULT_STREAM_BUFFER_BYTES,
        }
    }
}

impl CryptoConfig {
    /// Load from the environment, reading `.env` first if present.
    ///
    /// - `COURIER_RSA_BITS`: RSA modulus size (default 2048)
    /// - `COURIER_STREAM_BUFFER_BYTES`: stream buffer size (default 65536)
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let modulus_bits = match lookup("COURIER_RSA_BITS") {
            Some(v) => v.trim().parse().context("COURIER_RSA_BITS must be an integer")?,
            None => defaults.modulus_bits,
        };
        let stream_buffer_bytes = match lookup("COURIER_STREAM_BUFFER_BYTES") {
            Some(v) => v
                .trim()
                .parse()
                .context("COURIER_STREAM_BUFFER_BYTES must be an integer")?,
            None => defaults.stream_buffer_bytes,
        };

        let config = Self { modulus_bits, stream_buffer_bytes };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !RSA_MODULUS_SIZES.contains(self.modulus_bits) {
            bail!(
                "RSA modulus of {} bits is not supported ({}..={} in steps of {})",
                self.modulus_bits,
                RSA_MODULUS_SIZES.min_bits,
                RSA_MODULUS_SIZES.max_bits,
                RSA_MODULUS_SIZES.skip_bits
            );
        }
        if self.stream_buffer_bytes == 0 {
            bail!("Stream buffer size must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = CryptoConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CryptoConfig::default());
        assert_eq!(config.modulus_bits, 2048);
        assert_eq!(config.stream_buffer_bytes, 65536);
    }

    #[test]
    fn reads_overrides() {
        let config = CryptoConfig::from_lookup(lookup(&[
            ("COURIER_RSA_BITS", "3072"),
            ("COURIER_STREAM_BUFFER_BYTES", " 4096 "),
        ]))
        .unwrap();
        assert_eq!(config.modulus_bits, 3072);
        assert_eq!(config.stream_buffer_bytes, 4096);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(CryptoConfig::from_lookup(lookup(&[("COURIER_RSA_BITS", "lots")])).is_err());
        assert!(CryptoConfig::from_lookup(lookup(&[("COURIER_RSA_BITS", "512")])).is_err());
        assert!(CryptoConfig::from_lookup(lookup(&[("COURIER_STREAM_BUFFER_BYTES", "0")])).is_err());
    }
}
