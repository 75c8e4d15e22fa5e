use std::path::{Path, PathBuf};

use jmod_cache::CacheError;
use jmod_diagnostics::{
    miette::{self, Diagnostic},
    thiserror::{self, Error},
    tracing,
};
use jmod_package_manifest::{DependencyGroup, PackageManifest};
use jmod_registry::{DependencyChain, RegistryError, Specifier, NPM_SOURCE};
use tokio::sync::mpsc;

use crate::State;

/// A dependency ready to be linked: the name under which the importer
/// declared it (for aliases this differs from the package's own name) and
/// the absolute directory holding its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    pub name: String,
    pub location: PathBuf,
}

#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum ResolveError {
    #[error("local dependency {spec} not found for {manifest}")]
    #[diagnostic(code(jmod_package_manager::local_not_found))]
    LocalNotFound { spec: String, manifest: String },

    #[error("unsupported specifier {spec:?} for {name}")]
    #[diagnostic(code(jmod_package_manager::unsupported_specifier))]
    Unsupported { spec: String, name: String },

    #[error("invalid version constraint {spec:?} for {name}")]
    #[diagnostic(code(jmod_package_manager::invalid_constraint))]
    InvalidConstraint { spec: String, name: String },

    #[error("failed to resolve {name}@{spec}: {source}")]
    #[diagnostic(code(jmod_package_manager::registry))]
    Registry {
        name: String,
        spec: String,
        #[source]
        source: RegistryError,
    },

    #[error("failed to cache {name}@{version}: {source}")]
    #[diagnostic(code(jmod_package_manager::cache))]
    Cache {
        name: String,
        version: String,
        #[source]
        source: CacheError,
    },
}

/// Resolve every dependency entry of `manifest` concurrently, one task per
/// entry, emitting resolved dependencies onto the returned channel in
/// completion order.
///
/// Entries from `optionalDependencies` downgrade failures to warnings and
/// are dropped; any other failure cancels the whole run with its message as
/// the cause. Cancellation stops emission eagerly.
pub fn resolve_dependencies_deep(
    state: &'static State,
    manifest: &PackageManifest,
    dev: bool,
    optional: bool,
    chain: DependencyChain,
) -> mpsc::Receiver<ResolvedDependency> {
    let (tx, rx) = mpsc::channel(16);

    let mut entries: Vec<(String, String, bool)> = Vec::new();
    for (name, spec) in manifest.dependencies([DependencyGroup::Prod]) {
        entries.push((name.to_string(), spec.to_string(), false));
    }
    if dev {
        for (name, spec) in manifest.dependencies([DependencyGroup::Dev]) {
            entries.push((name.to_string(), spec.to_string(), false));
        }
    }
    if optional {
        for (name, spec) in manifest.dependencies([DependencyGroup::Optional]) {
            entries.push((name.to_string(), spec.to_string(), true));
        }
    }

    let manifest_dir = manifest.dir().to_path_buf();
    for (name, spec, entry_optional) in entries {
        let tx = tx.clone();
        let chain = chain.clone();
        let manifest_dir = manifest_dir.clone();
        tokio::spawn(async move {
            match resolve_entry(state, &manifest_dir, &name, &spec).await {
                Ok(Some(dependency)) => {
                    tokio::select! {
                        _ = state.cancel.cancelled() => {}
                        _ = tx.send(dependency) => {}
                    }
                }
                // cancelled mid-resolution: drop silently
                Ok(None) => {}
                Err(error) if entry_optional => {
                    tracing::warn!("skipping optional dependency: {error}");
                }
                Err(error) => {
                    state.cancel.cancel_with_cause(chain.wrap(&error));
                }
            }
        });
    }

    rx
}

async fn resolve_entry(
    state: &'static State,
    manifest_dir: &Path,
    key: &str,
    spec: &str,
) -> Result<Option<ResolvedDependency>, ResolveError> {
    let (name, range_spec) = match Specifier::parse(spec) {
        Specifier::Local(path) => {
            let joined = if Path::new(&path).is_absolute() {
                PathBuf::from(&path)
            } else {
                manifest_dir.join(&path)
            };
            let location = std::path::absolute(&joined).ok().filter(|joined| joined.exists());
            return match location {
                Some(location) => Ok(Some(ResolvedDependency { name: key.to_string(), location })),
                None => Err(ResolveError::LocalNotFound {
                    spec: spec.to_string(),
                    manifest: manifest_dir.display().to_string(),
                }),
            };
        }
        Specifier::Git(_) | Specifier::Github(_) | Specifier::Jsr(_) => {
            return Err(ResolveError::Unsupported {
                spec: spec.to_string(),
                name: key.to_string(),
            });
        }
        Specifier::NpmAlias { name, spec } => (name, spec),
        Specifier::RangeOrTag(range_spec) => (key.to_string(), range_spec),
    };

    let range = match range_spec.parse::<node_semver::Range>() {
        Ok(range) => range,
        Err(_) => {
            // might be a distribution tag like `latest` or `next`
            let invalid = || ResolveError::InvalidConstraint {
                spec: range_spec.clone(),
                name: name.clone(),
            };
            let tag_version =
                jmod_registry::get_version(&state.http_client, &state.registry, &name, &range_spec)
                    .await
                    .map_err(|_| invalid())?;
            tag_version.parse::<node_semver::Range>().map_err(|_| invalid())?
        }
    };

    if let Some(location) = state.cache.has(NPM_SOURCE, &name, &range) {
        return Ok(Some(ResolvedDependency { name: key.to_string(), location }));
    }

    let resolveable = match jmod_registry::resolve(
        &state.http_client,
        &state.registry,
        &state.cancel,
        &name,
        &range,
    )
    .await
    {
        Ok(resolveable) => resolveable,
        Err(RegistryError::Cancelled) => return Ok(None),
        Err(source) => {
            return Err(ResolveError::Registry { name, spec: range_spec, source });
        }
    };

    let started = std::time::Instant::now();
    match state.cache.put(&state.cancel, &state.http_client, NPM_SOURCE, &resolveable).await {
        Ok(location) => {
            tracing::debug!(package = %resolveable, elapsed = ?started.elapsed(), "downloaded");
            Ok(Some(ResolvedDependency { name: key.to_string(), location }))
        }
        Err(source) if source.is_cancellation() => Ok(None),
        Err(source) => Err(ResolveError::Cache {
            name: resolveable.name().to_string(),
            version: resolveable.version(),
            source,
        }),
    }
}
