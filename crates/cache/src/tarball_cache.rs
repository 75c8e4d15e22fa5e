use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use jmod_diagnostics::tracing;
use jmod_tarball::{normalize_expected, ChecksumFormat};
use sha2::{Digest, Sha256};

/// File name for a cached tarball: `sha256(url)` plus the checksum format
/// suffix. A sidecar `<file>.checksum` holds the lowercase hex digest.
fn cache_file_name(url: &str, format: ChecksumFormat) -> String {
    let url_hash = hex::encode(Sha256::digest(url.as_bytes()));
    format!("{url_hash}{}.tgz", format.extension())
}

fn sidecar_path(cache_file: &Path) -> PathBuf {
    let mut os: OsString = cache_file.into();
    os.push(".checksum");
    PathBuf::from(os)
}

/// Look up a cached tarball for `url`. The entry may have been written
/// under either checksum format; only one whose digest size matches the
/// expected `format` is usable.
pub fn lookup(root: &Path, url: &str, format: ChecksumFormat) -> Option<(PathBuf, Vec<u8>)> {
    for candidate in [format, ChecksumFormat::Sha512, ChecksumFormat::Sha256] {
        let cache_file = root.join(cache_file_name(url, candidate));
        if !cache_file.is_file() {
            continue;
        }
        let Ok(sidecar) = fs::read(sidecar_path(&cache_file)) else {
            continue;
        };
        let Ok(sum) = normalize_expected(&sidecar, candidate) else {
            continue;
        };
        if sum.len() != format.digest_size() {
            continue;
        }
        return Some((cache_file, sum));
    }
    None
}

/// Best-effort write of a freshly downloaded tarball into the secondary
/// cache. Failures are logged and otherwise ignored.
pub fn save(root: &Path, url: &str, archive: &Path, checksum: &[u8], format: ChecksumFormat) {
    let cache_file = root.join(cache_file_name(url, format));
    if let Err(error) = fs::copy(archive, &cache_file) {
        tracing::debug!(%error, "skipping tarball cache write");
        return;
    }
    if let Err(error) = fs::write(sidecar_path(&cache_file), hex::encode(checksum)) {
        tracing::debug!(%error, "skipping tarball cache write");
        let _ = fs::remove_file(&cache_file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const URL: &str = "https://registry.npmjs.org/leftpad/-/leftpad-1.3.1.tgz";

    #[test]
    fn save_then_lookup_roundtrips() {
        let root = tempdir().unwrap();
        let archive = root.path().join("source.tgz");
        fs::write(&archive, b"archive-bytes").unwrap();
        let checksum: Vec<u8> = (0u8..32).collect();

        save(root.path(), URL, &archive, &checksum, ChecksumFormat::Sha256);

        let (file, sum) = lookup(root.path(), URL, ChecksumFormat::Sha256).unwrap();
        assert_eq!(sum, checksum);
        assert_eq!(fs::read(file).unwrap(), b"archive-bytes");
    }

    #[test]
    fn lookup_misses_other_urls() {
        let root = tempdir().unwrap();
        let archive = root.path().join("source.tgz");
        fs::write(&archive, b"bytes").unwrap();
        save(root.path(), URL, &archive, &(0u8..32).collect::<Vec<u8>>(), ChecksumFormat::Sha256);

        assert!(lookup(root.path(), "https://example.com/other.tgz", ChecksumFormat::Sha256)
            .is_none());
    }

    #[test]
    fn lookup_rejects_digest_size_mismatch() {
        let root = tempdir().unwrap();
        let archive = root.path().join("source.tgz");
        fs::write(&archive, b"bytes").unwrap();
        // entry written as sha256; a sha512 expectation cannot use it
        save(root.path(), URL, &archive, &(0u8..32).collect::<Vec<u8>>(), ChecksumFormat::Sha256);

        assert!(lookup(root.path(), URL, ChecksumFormat::Sha512).is_none());
    }

    #[test]
    fn lookup_ignores_missing_sidecar() {
        let root = tempdir().unwrap();
        let cache_file = root.path().join(cache_file_name(URL, ChecksumFormat::Sha256));
        fs::write(&cache_file, b"bytes").unwrap();

        assert!(lookup(root.path(), URL, ChecksumFormat::Sha256).is_none());
    }
}
