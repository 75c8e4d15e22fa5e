use std::{io, path::PathBuf};

use futures_util::future;
use jmod_diagnostics::{
    miette::{self, Diagnostic},
    thiserror::{self, Error},
};
use jmod_package_manifest::{find_workspaces, PackageManifest, PackageManifestError};
use jmod_registry::DependencyChain;

use crate::{
    fs::ensure_executable,
    lifecycle::{run_lifecycle, LifecycleError},
    link::{link, LinkError},
    resolve::{resolve_dependencies_deep, ResolvedDependency},
    State,
};

#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum InstallError {
    #[error(transparent)]
    #[diagnostic(code(jmod_package_manager::io_error))]
    Io(#[from] io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("read manifest of {path}: {source}")]
    #[diagnostic(code(jmod_package_manager::dependency_manifest))]
    DependencyManifest {
        path: String,
        #[source]
        source: PackageManifestError,
    },

    #[error("bin {bin:?} points to missing file {path}")]
    #[diagnostic(code(jmod_package_manager::missing_bin))]
    MissingBin { bin: String, path: String },
}

/// This subroutine does everything `jmod install` is supposed to do: walk
/// the workspaces under `root`, materialize each one's dependencies into
/// its `node_modules`, wire executables, and orchestrate lifecycle scripts.
#[must_use]
pub struct Install {
    pub state: &'static State,
    pub root: PathBuf,
    pub ignore_scripts: bool,
    pub dev: bool,
    pub optional: bool,
    pub chain: DependencyChain,
}

impl Install {
    /// Execute the subroutine. One task per workspace; the first failure
    /// cancels the run and is returned.
    ///
    /// Returns a boxed, explicitly `Send` future rather than being an `async
    /// fn`: `run` recursively calls itself (through `materialize_workspace`),
    /// and rustc cannot prove auto-trait bounds through self-recursive
    /// `async fn`s without this indirection.
    pub fn run(
        self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), InstallError>> + Send>>
    {
        Box::pin(async move {
            let Install { state, root, ignore_scripts, dev, optional, chain } = self;
            if state.cancel.is_cancelled() {
                return Ok(());
            }

            let workspaces = find_workspaces(&root);
            let tasks: Vec<_> = workspaces
                .into_iter()
                .map(|manifest| {
                    let chain = chain.clone();
                    tokio::spawn(install_workspace(
                        state,
                        manifest,
                        ignore_scripts,
                        dev,
                        optional,
                        chain,
                    ))
                })
                .collect();

            for result in future::join_all(tasks).await {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => return Err(error),
                    Err(join_error) => return Err(InstallError::Io(io::Error::other(join_error))),
                }
            }
            Ok(())
        })
    }
}

async fn install_workspace(
    state: &'static State,
    manifest: PackageManifest,
    ignore_scripts: bool,
    dev: bool,
    optional: bool,
    chain: DependencyChain,
) -> Result<(), InstallError> {
    let workspace_dir = std::path::absolute(manifest.dir())?;
    let label = manifest.name().map(str::to_string).unwrap_or_else(|| workspace_dir.display().to_string());
    let chain = chain.with(label);

    match materialize_workspace(state, &manifest, &workspace_dir, ignore_scripts, dev, optional, &chain)
        .await
    {
        Ok(()) => Ok(()),
        Err(error) => {
            // the first error becomes the cancellation cause, later ones lose
            state.cancel.cancel_with_cause(chain.wrap(&error));
            Err(error)
        }
    }
}

async fn materialize_workspace(
    state: &'static State,
    manifest: &PackageManifest,
    workspace_dir: &std::path::Path,
    ignore_scripts: bool,
    dev: bool,
    optional: bool,
    chain: &DependencyChain,
) -> Result<(), InstallError> {
    if !ignore_scripts {
        run_lifecycle(state, workspace_dir, "preinstall").await?;
    }

    let node_modules = workspace_dir.join("node_modules");
    let mut dependencies = resolve_dependencies_deep(state, manifest, dev, optional, chain.clone());
    while let Some(dependency) = dependencies.recv().await {
        if state.cancel.is_cancelled() {
            return Ok(());
        }

        link(state, &dependency.location, &node_modules.join(&dependency.name)).await?;

        if state.mark_installed(&dependency.location) {
            Install {
                state,
                root: dependency.location.clone(),
                ignore_scripts,
                dev: false,
                optional,
                chain: chain.with(&dependency.name),
            }
            .run()
            .await?;
        }

        setup_bins(state, &dependency, &node_modules).await?;
    }

    if state.cancel.is_cancelled() {
        return Ok(());
    }
    if !ignore_scripts {
        run_lifecycle(state, workspace_dir, "install").await?;
        run_lifecycle(state, workspace_dir, "postinstall").await?;
    }
    Ok(())
}

/// Wire the executables declared by the dependency's own manifest into the
/// workspace's `node_modules/.bin`.
async fn setup_bins(
    state: &'static State,
    dependency: &ResolvedDependency,
    node_modules: &std::path::Path,
) -> Result<(), InstallError> {
    let manifest_error = |source| InstallError::DependencyManifest {
        path: dependency.location.display().to_string(),
        source,
    };
    let manifest = PackageManifest::from_dir(&dependency.location).map_err(manifest_error)?;

    for (bin_name, relative_path) in manifest.bin_entries().map_err(manifest_error)? {
        let bin_path = dependency.location.join(&relative_path);
        if !bin_path.is_file() {
            return Err(InstallError::MissingBin {
                bin: bin_name,
                path: bin_path.display().to_string(),
            });
        }
        ensure_executable(&bin_path)?;
        link(state, &bin_path, &node_modules.join(".bin").join(&bin_name)).await?;
    }
    Ok(())
}
