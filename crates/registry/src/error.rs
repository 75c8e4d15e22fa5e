use jmod_diagnostics::{
    miette::{self, Diagnostic},
    thiserror::{self, Error},
};

#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum RegistryError {
    #[error(transparent)]
    #[diagnostic(code(jmod_registry::network_error))]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    #[diagnostic(code(jmod_registry::network_middleware_error))]
    NetworkMiddleware(#[from] reqwest_middleware::Error),

    #[error("unexpected response status {status} from {url}")]
    #[diagnostic(code(jmod_registry::bad_status))]
    BadStatus { status: reqwest::StatusCode, url: String },

    #[error("no version of {name} satisfies {range}")]
    #[diagnostic(code(jmod_registry::no_matching_version))]
    NoMatchingVersion { name: String, range: String },

    #[error("request cancelled")]
    #[diagnostic(code(jmod_registry::cancelled))]
    Cancelled,
}
