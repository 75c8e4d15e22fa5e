use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use jmod_diagnostics::{
    miette::{self, Diagnostic},
    thiserror::{self, Error},
};
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;

#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum ChecksumError {
    #[error("expected checksum is not {want} bytes (raw, hex, or base64)")]
    #[diagnostic(code(jmod_tarball::checksum_undecodable))]
    Undecodable { want: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumFormat {
    Sha256,
    Sha512,
}

impl ChecksumFormat {
    pub fn digest_size(self) -> usize {
        match self {
            ChecksumFormat::Sha256 => 32,
            ChecksumFormat::Sha512 => 64,
        }
    }

    /// File name suffix used by the tarball cache.
    pub fn extension(self) -> &'static str {
        match self {
            ChecksumFormat::Sha256 => ".sha256",
            ChecksumFormat::Sha512 => ".sha512",
        }
    }
}

impl fmt::Display for ChecksumFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumFormat::Sha256 => f.write_str("sha256"),
            ChecksumFormat::Sha512 => f.write_str("sha512"),
        }
    }
}

/// Streaming hasher fed alongside file writes so an archive is hashed
/// exactly once during download.
pub enum Hasher {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    pub fn new(format: ChecksumFormat) -> Self {
        match format {
            ChecksumFormat::Sha256 => Hasher::Sha256(Sha256::new()),
            ChecksumFormat::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha256(hasher) => hasher.update(data),
            Hasher::Sha512(hasher) => hasher.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            Hasher::Sha256(hasher) => hasher.finalize().to_vec(),
            Hasher::Sha512(hasher) => hasher.finalize().to_vec(),
        }
    }
}

/// Decode an expected digest into raw bytes.
///
/// Raw bytes of the correct size are used as-is. Anything else is treated as
/// text and tried as hex, then standard base64, then unpadded base64. The
/// first decoding that yields `digest_size` bytes wins.
pub fn normalize_expected(
    expected: &[u8],
    format: ChecksumFormat,
) -> Result<Vec<u8>, ChecksumError> {
    let want = format.digest_size();

    if expected.len() == want {
        return Ok(expected.to_vec());
    }

    let text = String::from_utf8_lossy(expected);
    let text = text.trim();

    if text.len() == want * 2 {
        if let Ok(bytes) = hex::decode(text) {
            if bytes.len() == want {
                return Ok(bytes);
            }
        }
    }

    if let Ok(bytes) = general_purpose::STANDARD.decode(text) {
        if bytes.len() == want {
            return Ok(bytes);
        }
    }
    if let Ok(bytes) = general_purpose::STANDARD_NO_PAD.decode(text) {
        if bytes.len() == want {
            return Ok(bytes);
        }
    }

    Err(ChecksumError::Undecodable { want })
}

/// Constant-time digest comparison. Unequal lengths compare unequal.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn hasher_computes_sha256() {
        let mut hasher = Hasher::new(ChecksumFormat::Sha256);
        hasher.update(b"abc");
        assert_eq!(hex::encode(hasher.finalize()), ABC_SHA256);
    }

    #[test]
    fn normalize_is_idempotent_over_raw_digests() {
        let raw = hex::decode(ABC_SHA256).unwrap();
        let once = normalize_expected(&raw, ChecksumFormat::Sha256).unwrap();
        assert_eq!(once, raw);
        let twice = normalize_expected(&once, ChecksumFormat::Sha256).unwrap();
        assert_eq!(twice, raw);
    }

    #[test]
    fn normalize_decodes_hex() {
        let decoded = normalize_expected(ABC_SHA256.as_bytes(), ChecksumFormat::Sha256).unwrap();
        assert_eq!(hex::encode(decoded), ABC_SHA256);
    }

    #[test]
    fn normalize_decodes_base64() {
        let raw = hex::decode(ABC_SHA256).unwrap();
        let padded = general_purpose::STANDARD.encode(&raw);
        assert_eq!(normalize_expected(padded.as_bytes(), ChecksumFormat::Sha256).unwrap(), raw);
        let unpadded = general_purpose::STANDARD_NO_PAD.encode(&raw);
        assert_eq!(normalize_expected(unpadded.as_bytes(), ChecksumFormat::Sha256).unwrap(), raw);
    }

    #[test]
    fn normalize_trims_whitespace() {
        let raw = hex::decode(ABC_SHA256).unwrap();
        let text = format!("  {ABC_SHA256}\n");
        assert_eq!(normalize_expected(text.as_bytes(), ChecksumFormat::Sha256).unwrap(), raw);
    }

    #[test]
    fn normalize_rejects_wrong_size() {
        assert!(normalize_expected(b"deadbeef", ChecksumFormat::Sha256).is_err());
        assert!(normalize_expected(&[0u8; 16], ChecksumFormat::Sha512).is_err());
    }

    #[test]
    fn constant_time_eq_handles_lengths() {
        assert!(constant_time_eq(b"same", b"same"));
        assert!(!constant_time_eq(b"same", b"other"));
        assert!(!constant_time_eq(b"short", b"longer-input"));
    }
}
