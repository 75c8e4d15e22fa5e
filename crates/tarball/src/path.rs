use std::path::{Path, PathBuf};

use crate::TarballError;

/// Lexically clean a forward-slash path: collapse repeated separators, drop
/// `.` components, resolve `..` against preceding components. Unresolvable
/// `..` components stay at the front. Empty input cleans to `.`.
fn clean_slash(input: &str) -> String {
    let rooted = input.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for component in input.split('/') {
        match component {
            "" | "." => continue,
            ".." => match parts.last() {
                Some(&"..") => parts.push(".."),
                Some(_) => {
                    parts.pop();
                }
                None if rooted => {}
                None => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Canonicalize a tar entry name. Returns `Ok(None)` for names that should
/// be skipped (empty or `.`), an error for names that escape the root or are
/// absolute.
pub fn normalize_tar_path(name: &str) -> Result<Option<String>, TarballError> {
    let cleaned = name.replace('\\', "/");
    let cleaned = clean_slash(cleaned.trim());

    if cleaned == "." {
        return Ok(None);
    }
    if cleaned == ".." || cleaned.starts_with("../") {
        return Err(TarballError::PathEscape { name: name.to_string() });
    }
    if cleaned.starts_with('/') {
        return Err(TarballError::AbsolutePath { name: name.to_string() });
    }

    Ok(Some(cleaned))
}

/// Join an untrusted archive member name onto a trusted base directory,
/// verifying that the result stays inside `base`.
pub fn secure_join(base: &Path, name: &str) -> Result<PathBuf, TarballError> {
    let clean = clean_slash(&name.replace('\\', "/"));

    // `..` must be rejected before joining, the lexical join below would
    // silently walk out of `base` otherwise.
    if clean == ".." || clean.starts_with("../") {
        return Err(TarballError::PathEscape { name: name.to_string() });
    }
    if clean.starts_with('/') || Path::new(&clean).is_absolute() {
        return Err(TarballError::AbsolutePath { name: name.to_string() });
    }

    let abs_base = std::path::absolute(base)?;
    let abs_full =
        if clean == "." { abs_base.clone() } else { std::path::absolute(abs_base.join(&clean))? };

    if !abs_full.starts_with(&abs_base) {
        return Err(TarballError::PathEscape { name: name.to_string() });
    }
    Ok(abs_full)
}
