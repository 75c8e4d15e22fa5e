use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

use jmod_cache::{Cache, CacheError};
use jmod_cancel::CancelToken;
use jmod_network::ThrottledClient;
use tokio::sync::Mutex;

/// Shared state of one install run: the HTTP client, the package cache, the
/// cancellation token, and the process-global dedup sets.
pub struct State {
    pub http_client: ThrottledClient,
    /// Registry base URL.
    pub registry: String,
    pub cache: Cache,
    pub cancel: CancelToken,
    installed: RwLock<HashSet<PathBuf>>,
    lifecycles_run: RwLock<HashSet<String>>,
    pub(crate) link_lock: Mutex<()>,
}

impl State {
    pub fn new(cancel: CancelToken) -> Result<Self, CacheError> {
        Ok(State::with_cache(Cache::new()?, jmod_registry::DEFAULT_REGISTRY, cancel))
    }

    /// State over an explicit cache and registry endpoint, for tests.
    pub fn with_cache(cache: Cache, registry: impl Into<String>, cancel: CancelToken) -> Self {
        State {
            http_client: ThrottledClient::new_from_cpu_count(),
            registry: registry.into(),
            cache,
            cancel,
            installed: RwLock::default(),
            lifecycles_run: RwLock::default(),
            link_lock: Mutex::new(()),
        }
    }

    pub fn leak(self) -> &'static State {
        Box::leak(Box::new(self))
    }

    /// Mark a cached directory as installed. Returns true for the first
    /// caller only. Keyed by both the raw and the symlink-resolved path so
    /// either form of the same directory triggers a hit, which also breaks
    /// `file:` cycles.
    pub(crate) fn mark_installed(&self, location: &Path) -> bool {
        let canonical = fs::canonicalize(location).unwrap_or_else(|_| location.to_path_buf());
        {
            let seen = self.installed.read().expect("installed set lock poisoned");
            if seen.contains(location) || seen.contains(&canonical) {
                return false;
            }
        }
        let mut seen = self.installed.write().expect("installed set lock poisoned");
        if seen.contains(location) || seen.contains(&canonical) {
            return false;
        }
        seen.insert(location.to_path_buf());
        seen.insert(canonical);
        true
    }

    /// Claim a lifecycle dedup key. Returns true for the first caller only.
    pub(crate) fn mark_lifecycle_run(&self, key: &str) -> bool {
        {
            let seen = self.lifecycles_run.read().expect("lifecycle set lock poisoned");
            if seen.contains(key) {
                return false;
            }
        }
        let mut seen = self.lifecycles_run.write().expect("lifecycle set lock poisoned");
        seen.insert(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn state(dir: &Path) -> State {
        let cache = Cache::at(dir.join("packages"), dir.join("tarballs")).unwrap();
        State::with_cache(cache, "http://127.0.0.1:1", CancelToken::new())
    }

    #[test]
    fn mark_installed_is_first_caller_wins() {
        let dir = tempdir().unwrap();
        let state = state(dir.path());
        let location = dir.path().join("pkg");
        fs::create_dir_all(&location).unwrap();

        assert!(state.mark_installed(&location));
        assert!(!state.mark_installed(&location));
    }

    #[cfg(unix)]
    #[test]
    fn mark_installed_conflates_symlinked_forms() {
        let dir = tempdir().unwrap();
        let state = state(dir.path());
        let real = dir.path().join("real");
        fs::create_dir_all(&real).unwrap();
        let alias = dir.path().join("alias");
        std::os::unix::fs::symlink(&real, &alias).unwrap();

        assert!(state.mark_installed(&alias));
        assert!(!state.mark_installed(&real));
    }

    #[test]
    fn mark_lifecycle_run_deduplicates() {
        let dir = tempdir().unwrap();
        let state = state(dir.path());
        assert!(state.mark_lifecycle_run("npm:a@1.0.0#postinstall"));
        assert!(!state.mark_lifecycle_run("npm:a@1.0.0#postinstall"));
        assert!(state.mark_lifecycle_run("npm:a@1.0.0#preinstall"));
    }
}
