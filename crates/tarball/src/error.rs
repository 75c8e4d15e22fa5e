use jmod_diagnostics::{
    miette::{self, Diagnostic},
    thiserror::{self, Error},
};

#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum TarballError {
    #[error(transparent)]
    #[diagnostic(code(jmod_tarball::io_error))]
    Io(#[from] std::io::Error),

    #[error("path escapes destination: {name:?}")]
    #[diagnostic(code(jmod_tarball::path_escape))]
    PathEscape { name: String },

    #[error("absolute path in archive: {name:?}")]
    #[diagnostic(code(jmod_tarball::absolute_path))]
    AbsolutePath { name: String },

    #[error("malformed archive: {0}")]
    #[diagnostic(code(jmod_tarball::malformed_archive))]
    MalformedArchive(String),

    #[error("extraction cancelled")]
    #[diagnostic(code(jmod_tarball::cancelled))]
    Cancelled,
}
