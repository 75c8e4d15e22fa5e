use jmod_diagnostics::{
    miette::{self, Diagnostic},
    thiserror::{self, Error},
};
use jmod_tarball::{ChecksumError, TarballError};

#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum CacheError {
    #[error(transparent)]
    #[diagnostic(code(jmod_cache::io_error))]
    Io(#[from] std::io::Error),

    #[error("user cache directory is not available")]
    #[diagnostic(code(jmod_cache::no_cache_dir))]
    NoCacheDir,

    #[error(transparent)]
    #[diagnostic(code(jmod_cache::network_error))]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    #[diagnostic(code(jmod_cache::network_middleware_error))]
    NetworkMiddleware(#[from] reqwest_middleware::Error),

    #[error("unexpected response status {status} from {url}")]
    #[diagnostic(code(jmod_cache::bad_status))]
    BadStatus { status: reqwest::StatusCode, url: String },

    #[error("unknown checksum format for {package}")]
    #[diagnostic(code(jmod_cache::unknown_checksum_format))]
    UnknownChecksumFormat { package: String },

    #[error(transparent)]
    #[diagnostic(code(jmod_cache::checksum_decode))]
    Checksum(#[from] ChecksumError),

    #[error("checksum mismatch for {name} {version}")]
    #[diagnostic(code(jmod_cache::checksum_mismatch))]
    ChecksumMismatch { name: String, version: String },

    #[error(transparent)]
    #[diagnostic(code(jmod_cache::extract_error))]
    Extract(#[from] TarballError),

    #[error("download cancelled")]
    #[diagnostic(code(jmod_cache::cancelled))]
    Cancelled,

    #[error("download deadline exceeded")]
    #[diagnostic(code(jmod_cache::deadline_exceeded))]
    Timeout,
}

impl CacheError {
    /// Cancellation and deadline errors are control flow: they clear status
    /// entries instead of reporting and never surface as user errors.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            CacheError::Cancelled | CacheError::Timeout | CacheError::Extract(TarballError::Cancelled)
        )
    }
}
