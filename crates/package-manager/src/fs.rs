use std::{io, path::Path};

/// Create a symlink to a directory.
///
/// The `link` path will be a symbolic link pointing to `original`.
#[cfg(unix)]
pub fn symlink_dir(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

/// Create a directory link, trying a junction first because symlinks may
/// require elevated privileges on Windows.
#[cfg(windows)]
pub fn symlink_dir(original: &Path, link: &Path) -> io::Result<()> {
    match junction::create(original, link) {
        Ok(()) => Ok(()),
        Err(junction_error) => {
            std::os::windows::fs::symlink_dir(original, link).map_err(|symlink_error| {
                io::Error::other(format!(
                    "junction: {junction_error}; symlink: {symlink_error}"
                ))
            })
        }
    }
}

/// Add the executable bits without touching other permissions. A no-op on
/// platforms without an executable flag.
pub fn ensure_executable(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = std::fs::metadata(path)?;
        let mode = metadata.permissions().mode();
        if mode & 0o111 == 0 {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode | 0o111))?;
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::{fs, os::unix::fs::PermissionsExt};
    use tempfile::tempdir;

    #[test]
    fn ensure_executable_adds_exec_bits() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("tool.js");
        fs::write(&file, "#!/usr/bin/env node\n").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();

        ensure_executable(&file).unwrap();
        let mode = fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn ensure_executable_keeps_existing_bits() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("tool");
        fs::write(&file, "x").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o700)).unwrap();

        ensure_executable(&file).unwrap();
        let mode = fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
