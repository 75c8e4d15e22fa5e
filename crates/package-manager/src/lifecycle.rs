use std::{fs, io, path::Path};

use jmod_diagnostics::{
    miette::{self, Diagnostic},
    thiserror::{self, Error},
    tracing,
};
use jmod_package_manifest::PackageManifest;
use jmod_registry::NPM_SOURCE;
use jmod_scripts_runner::{NpmCommand, ScriptsRunnerError};

use crate::State;

#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum LifecycleError {
    #[error("lifecycle script {script:?} of {name}@{version} failed: {source}")]
    #[diagnostic(code(jmod_package_manager::lifecycle_failed))]
    Failed {
        script: String,
        name: String,
        version: String,
        #[source]
        source: ScriptsRunnerError,
    },
}

/// Run one lifecycle script (`preinstall`, `install`, `postinstall`) of the
/// package at `dir`.
///
/// The dedup key `<source>:<name>@<version>#<script>` is computed over the
/// symlink-resolved directory so two workspace-linked copies of the same
/// version run the script once per process; the first caller wins. A
/// missing script is a no-op.
pub async fn run_lifecycle(state: &State, dir: &Path, script: &str) -> Result<(), LifecycleError> {
    let canonical = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());

    let Ok(manifest) = PackageManifest::from_dir(&canonical) else {
        return Ok(());
    };
    if manifest.script(script, true).ok().flatten().is_none() {
        return Ok(());
    }

    let identifier = match (manifest.name(), manifest.version()) {
        (Some(name), Some(version)) => format!("{name}@{version}"),
        (Some(name), None) => name.to_string(),
        _ => canonical.display().to_string(),
    };
    let key = format!("{NPM_SOURCE}:{identifier}#{script}");
    if !state.mark_lifecycle_run(&key) {
        return Ok(());
    }

    tracing::debug!(package = %identifier, script, "running lifecycle script");

    let failed = |source| LifecycleError::Failed {
        script: script.to_string(),
        name: manifest.name().unwrap_or("?").to_string(),
        version: manifest.version().unwrap_or("?").to_string(),
        source,
    };

    let run_dir = canonical.clone();
    let script_name = script.to_string();
    let extra_env = vec![("npm_lifecycle_event".to_string(), script.to_string())];
    let result = tokio::task::spawn_blocking(move || {
        jmod_scripts_runner::run(&run_dir, &script_name, &[], NpmCommand::Install, &extra_env)
    })
    .await
    .map_err(|join_error| failed(ScriptsRunnerError::Io(io::Error::other(join_error))))?;

    match result {
        Ok(()) => Ok(()),
        // a vanished script between the lookup above and the runner's own
        // read is still a no-op
        Err(ScriptsRunnerError::ScriptNotFound(_)) => Ok(()),
        Err(source) => Err(failed(source)),
    }
}
