use std::{
    fmt, fs,
    io::{self, Read},
    path::Path,
};

use flate2::read::GzDecoder;
use jmod_cancel::CancelToken;
use liblzma::read::XzDecoder;
use tar::{Archive, Entry, EntryType};

use crate::{
    path::{normalize_tar_path, secure_join},
    TarballError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveFormat::TarGz => f.write_str("tar.gz"),
            ArchiveFormat::TarXz => f.write_str("tar.xz"),
        }
    }
}

/// Extract `archive` into `dest_dir/package`.
///
/// The compressed stream is buffered into a temporary `.tar` file which is
/// read twice: once to locate the root prefix (NPM tarballs wrap content in
/// a top-level directory whose name varies), once to extract. The archive
/// must contain a `package.json`. All paths are confined to the destination
/// via [`secure_join`]; cancellation is observed between entries.
pub fn extract_archive(
    archive: &Path,
    format: ArchiveFormat,
    dest_dir: &Path,
    cancel: &CancelToken,
) -> Result<(), TarballError> {
    let file = fs::File::open(archive)?;

    // Removed on drop, including every error path below.
    let mut buffered = tempfile::Builder::new().prefix("jmod-tar-").suffix(".tar").tempfile()?;
    match format {
        ArchiveFormat::TarGz => {
            io::copy(&mut GzDecoder::new(file), buffered.as_file_mut())?;
        }
        ArchiveFormat::TarXz => {
            io::copy(&mut XzDecoder::new(file), buffered.as_file_mut())?;
        }
    }

    let root = determine_tar_root(buffered.reopen()?)?;

    let dest = std::path::absolute(dest_dir.join("package"))?;
    fs::create_dir_all(&dest)?;

    extract_entries(buffered.reopen()?, root.as_deref(), &dest, cancel)
}

/// Locate the archive's root prefix: the directory of the shallowest
/// `package.json`, or no prefix when it sits at the archive root.
fn determine_tar_root(file: fs::File) -> Result<Option<String>, TarballError> {
    let mut archive = Archive::new(file);
    let mut package_json_paths = Vec::new();

    for entry in archive.entries()? {
        let entry = entry?;
        if is_metadata_header(entry.header().entry_type()) {
            continue;
        }
        let raw = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        if raw.is_empty() {
            continue;
        }
        let Some(name) = normalize_tar_path(&raw)? else {
            continue;
        };
        if name == "package.json" || name.ends_with("/package.json") {
            package_json_paths.push(name);
        }
    }

    let shallowest = package_json_paths
        .into_iter()
        .min_by_key(|path| path.matches('/').count())
        .ok_or_else(|| TarballError::MalformedArchive("package.json not found".to_string()))?;

    Ok(shallowest.rsplit_once('/').map(|(dir, _)| dir.to_string()))
}

fn extract_entries(
    file: fs::File,
    root: Option<&str>,
    dest: &Path,
    cancel: &CancelToken,
) -> Result<(), TarballError> {
    let mut archive = Archive::new(file);
    let mut extracted_package_json = false;

    for entry in archive.entries()? {
        if cancel.is_cancelled() {
            return Err(TarballError::Cancelled);
        }

        let mut entry = entry?;
        let entry_type = entry.header().entry_type();
        if is_metadata_header(entry_type) {
            continue;
        }

        let raw = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        if raw.is_empty() {
            continue;
        }
        let Some(name) = normalize_tar_path(&raw)? else {
            continue;
        };
        let Some(trimmed) = trim_tar_path(&name, root) else {
            continue;
        };
        if trimmed.is_empty() {
            continue;
        }

        let target = secure_join(dest, trimmed)?;
        let mode = entry.header().mode().unwrap_or(0o644);

        match entry_type {
            EntryType::Directory => make_dir(&target, mode)?,
            entry_type if entry_type.is_file() => {
                write_file(&mut entry, &target, mode)?;
                if trimmed == "package.json" {
                    extracted_package_json = true;
                }
            }
            EntryType::Symlink => extract_symlink(&entry, &target)?,
            EntryType::Link => extract_hardlink(&entry, root, dest, &target)?,
            _ => continue,
        }
    }

    if !extracted_package_json {
        return Err(TarballError::MalformedArchive("package.json not found".to_string()));
    }

    Ok(())
}

/// Strip the root prefix from a normalized entry name. `None` means the
/// entry lives outside the root and should be skipped.
fn trim_tar_path<'a>(normalized: &'a str, root: Option<&str>) -> Option<&'a str> {
    let Some(root) = root else {
        return Some(normalized);
    };
    if normalized == root {
        return Some("");
    }
    normalized.strip_prefix(root).and_then(|rest| rest.strip_prefix('/'))
}

fn is_metadata_header(entry_type: EntryType) -> bool {
    matches!(
        entry_type,
        EntryType::XHeader
            | EntryType::XGlobalHeader
            | EntryType::GNULongName
            | EntryType::GNULongLink
    )
}

fn make_dir(target: &Path, mode: u32) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        // force owner-write so nested entries can land inside
        builder.mode((mode & 0o777) | 0o200);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(target)
}

fn write_file(entry: &mut Entry<'_, impl Read>, target: &Path, mode: u32) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut options = fs::OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode & 0o777);
    }
    #[cfg(not(unix))]
    let _ = mode;
    let mut out = options.open(target)?;
    io::copy(entry, &mut out)?;
    Ok(())
}

fn extract_symlink(entry: &Entry<'_, impl Read>, target: &Path) -> Result<(), TarballError> {
    let link_name = entry
        .link_name_bytes()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default();
    if link_name.is_empty() || link_name.starts_with('/') || Path::new(&link_name).is_absolute() {
        return Err(TarballError::MalformedArchive(format!(
            "absolute symlink rejected: {link_name}"
        )));
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let _ = fs::remove_file(target);
    make_symlink(Path::new(&link_name), target)?;
    Ok(())
}

fn extract_hardlink(
    entry: &Entry<'_, impl Read>,
    root: Option<&str>,
    dest: &Path,
    target: &Path,
) -> Result<(), TarballError> {
    let link_raw = entry
        .link_name_bytes()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default();
    let outside = || {
        TarballError::MalformedArchive(format!("hardlink target outside package root: {link_raw}"))
    };
    let link_name = normalize_tar_path(&link_raw)?.ok_or_else(outside)?;
    let trimmed = trim_tar_path(&link_name, root).filter(|name| !name.is_empty()).ok_or_else(outside)?;
    let link_target = secure_join(dest, trimmed)?;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let _ = fs::remove_file(target);
    fs::hard_link(&link_target, target)?;
    Ok(())
}

#[cfg(unix)]
fn make_symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn make_symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(original, link)
}
