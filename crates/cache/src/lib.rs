//! Content-addressed package cache.
//!
//! Packages live at `<root>/<source>/<name>/<version>/package/`; existence
//! of that directory implies a successful, checksum-verified extraction.
//! Partial work uses `.download-*.tmp` and `.extract-*` siblings which are
//! removed on every exit path. A secondary cache keyed by `sha256(url)`
//! keeps raw tarballs so re-installs skip the network.

mod download;
mod error;
mod tarball_cache;

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use dashmap::DashMap;
use jmod_cancel::CancelToken;
use jmod_diagnostics::tracing;
use jmod_network::ThrottledClient;
use jmod_registry::Resolveable;
use tokio::sync::Mutex;

pub use error::CacheError;

/// Environment variable overriding the secondary (tarball) cache root.
pub const TARBALL_CACHE_ENV: &str = "JMOD_TARBALL_CACHE";

#[derive(Debug)]
pub struct Cache {
    root: PathBuf,
    tarball_root: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Cache {
    /// Cache rooted at the user cache directory (`<cache>/jmod`). The
    /// tarball cache sits next to it unless `JMOD_TARBALL_CACHE` overrides
    /// it.
    pub fn new() -> Result<Self, CacheError> {
        let base = dirs::cache_dir().ok_or(CacheError::NoCacheDir)?;
        let tarball_root = match std::env::var_os(TARBALL_CACHE_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => base.join("jmod-tarballs"),
        };
        Cache::at(base.join("jmod"), tarball_root)
    }

    /// Cache rooted at explicit directories, for tests.
    pub fn at(
        root: impl Into<PathBuf>,
        tarball_root: impl Into<PathBuf>,
    ) -> Result<Self, CacheError> {
        let root = root.into();
        let tarball_root = tarball_root.into();
        fs::create_dir_all(&root)?;
        fs::create_dir_all(&tarball_root)?;
        Ok(Cache { root, tarball_root, locks: DashMap::new() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tarball_root(&self) -> &Path {
        &self.tarball_root
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks.entry(key.to_string()).or_default().clone()
    }

    /// Look for an already-cached version of `name` satisfying `range`.
    /// Which satisfying version wins is unspecified; callers that care about
    /// ordering must go through the resolver.
    pub fn has(&self, registry: &str, name: &str, range: &node_semver::Range) -> Option<PathBuf> {
        let dir = self.root.join(registry).join(name);
        let entries = fs::read_dir(&dir).ok()?;
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(version_str) = file_name.to_str() else {
                continue;
            };
            let Ok(version) = version_str.parse::<node_semver::Version>() else {
                continue;
            };
            if version.satisfies(range) {
                return Some(dir.join(version_str).join("package"));
            }
        }
        None
    }

    /// Download, verify, and extract `resolveable`, returning the cached
    /// package directory. At most one extraction per `(registry, name,
    /// version)` is in flight across the process; concurrent callers
    /// serialize on a per-key lock and the winner's result is reused.
    pub async fn put(
        &self,
        cancel: &CancelToken,
        http: &ThrottledClient,
        registry: &str,
        resolveable: &Resolveable,
    ) -> Result<PathBuf, CacheError> {
        let name = resolveable.name().to_string();
        let version = resolveable.version();
        let key = format!("{registry}:{name}@{version}");

        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        let package_location = self.root.join(registry).join(&name).join(&version);
        if package_location.exists() {
            return Ok(package_location.join("package"));
        }

        match self.put_locked(cancel, http, resolveable, &package_location, &key).await {
            Ok(path) => {
                jmod_status::set_success(&key, format!("installed {name}@{version}"));
                let key = key.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    jmod_status::clear(&key);
                });
                Ok(path)
            }
            Err(error) if error.is_cancellation() => {
                // cancellation is control flow, not a user-visible failure
                jmod_status::clear(&key);
                Err(error)
            }
            Err(error) => {
                jmod_status::set_error(&key, format!("failed to install {name}@{version}: {error}"));
                Err(error)
            }
        }
    }

    async fn put_locked(
        &self,
        cancel: &CancelToken,
        http: &ThrottledClient,
        resolveable: &Resolveable,
        package_location: &Path,
        status_key: &str,
    ) -> Result<PathBuf, CacheError> {
        let parent =
            package_location.parent().expect("versioned cache path always has a parent");
        fs::create_dir_all(parent)?;

        let checksum_format = resolveable
            .checksum_format()
            .ok_or_else(|| CacheError::UnknownChecksumFormat { package: resolveable.to_string() })?;
        let expected_raw = resolveable
            .checksum()
            .ok_or_else(|| CacheError::UnknownChecksumFormat { package: resolveable.to_string() })?;

        let archive = download::download_to_temp_with_checksum(download::DownloadRequest {
            cancel,
            http,
            tarball_root: &self.tarball_root,
            url: resolveable.source_url(),
            format: checksum_format,
            dest_dir: parent,
            status_key,
            name: resolveable.name(),
            version: &resolveable.version(),
        })
        .await?;

        let expected = jmod_tarball::normalize_expected(&expected_raw, checksum_format)?;
        if !jmod_tarball::constant_time_eq(&expected, &archive.checksum) {
            return Err(CacheError::ChecksumMismatch {
                name: resolveable.name().to_string(),
                version: resolveable.version(),
            });
        }

        jmod_status::set_text(
            status_key,
            format!("extracting {}@{}", resolveable.name(), resolveable.version()),
        );

        // Staging dir and downloaded archive are both cleaned up on drop;
        // a successful rename below simply leaves nothing to clean.
        let staging = tempfile::Builder::new().prefix(".extract-").tempdir_in(parent)?;
        {
            let archive_path = archive.file.path().to_path_buf();
            let staging_path = staging.path().to_path_buf();
            let format = resolveable.source_format();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || {
                jmod_tarball::extract_archive(&archive_path, format, &staging_path, &cancel)
            })
            .await
            .map_err(|join_error| CacheError::Io(io::Error::other(join_error)))??;
        }

        // Clear any leftover of a prior failed attempt, then publish
        // atomically. rename is atomic within one filesystem.
        match fs::remove_dir_all(package_location) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(error.into()),
        }
        fs::rename(staging.path(), package_location)?;

        if !archive.reused_cache {
            tarball_cache::save(
                &self.tarball_root,
                resolveable.source_url(),
                archive.file.path(),
                &archive.checksum,
                checksum_format,
            );
        }

        tracing::debug!(package = %resolveable, "cached");
        Ok(package_location.join("package"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jmod_registry::{PackageDistribution, RegistryVersion};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn cache_in(dir: &Path) -> Cache {
        Cache::at(dir.join("packages"), dir.join("tarballs")).unwrap()
    }

    fn seed_entry(cache: &Cache, name: &str, version: &str) -> PathBuf {
        let package = cache.root().join("npm").join(name).join(version).join("package");
        fs::create_dir_all(&package).unwrap();
        fs::write(package.join("package.json"), "{}").unwrap();
        package
    }

    fn resolveable(name: &str, version: &str) -> Resolveable {
        Resolveable::Npm(RegistryVersion {
            name: name.to_string(),
            version: version.parse().unwrap(),
            dist: PackageDistribution {
                // localhost port 1 rejects connections, any network use fails fast
                integrity: Some("sha256-AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=".to_string()),
                shasum: None,
                tarball: format!("http://127.0.0.1:1/{name}/-/{name}-{version}.tgz"),
                unpacked_size: None,
            },
        })
    }

    #[test]
    fn has_finds_satisfying_version() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        seed_entry(&cache, "leftpad", "1.2.0");
        let expected = seed_entry(&cache, "leftpad", "1.3.1");

        let range: node_semver::Range = "^1.3.0".parse().unwrap();
        assert_eq!(cache.has("npm", "leftpad", &range), Some(expected));
    }

    #[test]
    fn has_ignores_unparseable_and_unsatisfying_entries() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        seed_entry(&cache, "leftpad", "1.2.0");
        fs::create_dir_all(cache.root().join("npm/leftpad/not-a-version")).unwrap();

        let range: node_semver::Range = "^2.0.0".parse().unwrap();
        assert_eq!(cache.has("npm", "leftpad", &range), None);
    }

    #[test]
    fn has_misses_unknown_package() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        let range: node_semver::Range = "*".parse().unwrap();
        assert_eq!(cache.has("npm", "ghost", &range), None);
    }

    #[tokio::test]
    async fn put_returns_existing_entry_without_network() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        let expected = seed_entry(&cache, "leftpad", "1.3.1");

        let cancel = CancelToken::new();
        let http = ThrottledClient::default();
        let path =
            cache.put(&cancel, &http, "npm", &resolveable("leftpad", "1.3.1")).await.unwrap();
        assert_eq!(path, expected);
    }

    #[tokio::test]
    async fn concurrent_put_of_same_key_yields_one_path() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(cache_in(dir.path()));
        let expected = seed_entry(&cache, "leftpad", "1.3.1");

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                let cancel = CancelToken::new();
                let http = ThrottledClient::default();
                cache.put(&cancel, &http, "npm", &resolveable("leftpad", "1.3.1")).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn put_without_checksum_format_fails() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        let resolveable = Resolveable::Npm(RegistryVersion {
            name: "leftpad".to_string(),
            version: "1.3.1".parse().unwrap(),
            dist: PackageDistribution {
                integrity: Some("sha1-YWJj".to_string()),
                shasum: None,
                tarball: "http://127.0.0.1:1/leftpad.tgz".to_string(),
                unpacked_size: None,
            },
        });

        let cancel = CancelToken::new();
        let http = ThrottledClient::default();
        let error = cache.put(&cancel, &http, "npm", &resolveable).await.unwrap_err();
        assert!(matches!(error, CacheError::UnknownChecksumFormat { .. }));
        assert!(!cache.root().join("npm/leftpad/1.3.1").exists());
    }
}
