mod chain;
mod client;
mod error;
mod package;
mod package_distribution;
mod package_version;
mod resolveable;
mod specifier;

pub use chain::DependencyChain;
pub use client::{get_version, resolve, DEFAULT_REGISTRY};
pub use error::RegistryError;
pub use package::Packument;
pub use package_distribution::PackageDistribution;
pub use package_version::RegistryVersion;
pub use resolveable::Resolveable;
pub use specifier::{split_package_spec, Specifier};

/// The only package source supported today.
pub const NPM_SOURCE: &str = "npm";
