use std::{
    fs, io,
    path::{Path, PathBuf},
};

use jmod_diagnostics::{
    miette::{self, Diagnostic},
    thiserror::{self, Error},
};

use crate::{fs::symlink_dir, State};

#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum LinkError {
    #[error("failed to remove existing entry at {path}: {source}")]
    #[diagnostic(code(jmod_package_manager::remove_existing))]
    RemoveExisting {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create directory at {dir}: {source}")]
    #[diagnostic(code(jmod_package_manager::create_parent_dir))]
    CreateParentDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create link at {path} to {target}: {source}")]
    #[diagnostic(code(jmod_package_manager::create_link))]
    CreateLink {
        target: PathBuf,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Idempotently place a link at `link_path` pointing to `target`.
///
/// Serialized by the global link lock to avoid races on shared `.bin`
/// directories. An existing link already resolving to `target` is left
/// alone; anything else at `link_path` is replaced.
pub async fn link(state: &State, target: &Path, link_path: &Path) -> Result<(), LinkError> {
    let _guard = state.link_lock.lock().await;

    if let Ok(metadata) = fs::symlink_metadata(link_path) {
        if metadata.file_type().is_symlink() && links_to(link_path, target) {
            return Ok(());
        }
        let removal = if metadata.is_dir() {
            fs::remove_dir_all(link_path)
        } else {
            fs::remove_file(link_path)
        };
        removal.map_err(|source| LinkError::RemoveExisting {
            path: link_path.to_path_buf(),
            source,
        })?;
    }

    if let Some(parent) = link_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|source| LinkError::CreateParentDir { dir: parent.to_path_buf(), source })?;
    }

    symlink_dir(target, link_path).map_err(|source| LinkError::CreateLink {
        target: target.to_path_buf(),
        path: link_path.to_path_buf(),
        source,
    })
}

/// Whether the link at `link_path` already resolves to `target`. Compared
/// through the OS, string equality is not reliable for junctions.
fn links_to(link_path: &Path, target: &Path) -> bool {
    match (fs::canonicalize(link_path), fs::canonicalize(target)) {
        (Ok(resolved_link), Ok(resolved_target)) => resolved_link == resolved_target,
        _ => fs::read_link(link_path).map(|raw| raw == target).unwrap_or(false),
    }
}
