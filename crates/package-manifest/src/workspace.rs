use std::path::Path;

use ignore::{overrides::OverrideBuilder, WalkBuilder};
use jmod_diagnostics::tracing;

use crate::PackageManifest;

/// Directory names never descended into during workspace discovery.
pub const IGNORE_DIRS: [&str; 8] =
    [".git", "node_modules", "vendor", ".idea", ".next", ".open-next", ".github", ".wrangler"];

/// File patterns excluded from discovery walks.
pub const IGNORE_GLOBS: [&str; 16] = [
    "*.json",
    "*.json5",
    "*.jsonc",
    "*.yaml",
    "*.yml",
    "*.md",
    "*.toml",
    "*.lock",
    "*.svg",
    "*.ico",
    "*.env",
    "*.env.*",
    ".npmrc",
    ".prettierignore",
    ".prettierrc",
    ".vars",
];

fn build_walker(root: &Path) -> Result<ignore::Walk, ignore::Error> {
    let mut overrides = OverrideBuilder::new(root);
    for dir in IGNORE_DIRS {
        overrides.add(&format!("!{dir}/"))?;
    }
    for glob in IGNORE_GLOBS {
        overrides.add(&format!("!{glob}"))?;
    }

    Ok(WalkBuilder::new(root)
        .standard_filters(false)
        .git_ignore(true)
        .require_git(false)
        .parents(false)
        .overrides(overrides.build()?)
        .follow_links(false)
        .build())
}

/// Discover every workspace under `root`: any directory holding a manifest
/// file, honoring the hard-coded ignore lists and all `.gitignore` files.
/// Directories without a readable manifest are silently skipped; walk
/// errors are logged and do not abort discovery.
pub fn find_workspaces(root: &Path) -> Vec<PackageManifest> {
    let walker = match build_walker(root) {
        Ok(walker) => walker,
        Err(error) => {
            tracing::error!(root = %root.display(), %error, "failed to build workspace walker");
            return Vec::new();
        }
    };

    let mut workspaces = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(root = %root.display(), %error, "workspace walk error");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|file_type| file_type.is_dir()) {
            continue;
        }
        if let Ok(manifest) = PackageManifest::from_dir(entry.path()) {
            workspaces.push(manifest);
        }
    }
    workspaces
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch_manifest(dir: &Path, contents: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("package.json"), contents).unwrap();
    }

    #[test]
    fn finds_nested_workspaces() {
        let root = tempdir().unwrap();
        touch_manifest(root.path(), r#"{ "name": "root" }"#);
        touch_manifest(&root.path().join("packages/a"), r#"{ "name": "a" }"#);
        touch_manifest(&root.path().join("packages/b"), r#"{ "name": "b" }"#);

        let mut names: Vec<String> = find_workspaces(root.path())
            .iter()
            .filter_map(|workspace| workspace.name().map(str::to_string))
            .collect();
        names.sort();
        assert_eq!(names, ["a", "b", "root"]);
    }

    #[test]
    fn skips_node_modules_and_friends() {
        let root = tempdir().unwrap();
        touch_manifest(root.path(), r#"{ "name": "root" }"#);
        touch_manifest(&root.path().join("node_modules/dep"), r#"{ "name": "dep" }"#);
        touch_manifest(&root.path().join(".git/hooks"), r#"{ "name": "hook" }"#);

        let names: Vec<_> = find_workspaces(root.path())
            .iter()
            .filter_map(|workspace| workspace.name().map(str::to_string))
            .collect();
        assert_eq!(names, ["root"]);
    }

    #[test]
    fn honors_gitignore_files() {
        let root = tempdir().unwrap();
        touch_manifest(root.path(), r#"{ "name": "root" }"#);
        fs::write(root.path().join(".gitignore"), "dist/\n").unwrap();
        touch_manifest(&root.path().join("dist"), r#"{ "name": "built" }"#);

        let names: Vec<_> = find_workspaces(root.path())
            .iter()
            .filter_map(|workspace| workspace.name().map(str::to_string))
            .collect();
        assert_eq!(names, ["root"]);
    }

    #[test]
    fn ignores_directories_without_manifests() {
        let root = tempdir().unwrap();
        touch_manifest(root.path(), r#"{ "name": "root" }"#);
        fs::create_dir_all(root.path().join("src/lib")).unwrap();

        assert_eq!(find_workspaces(root.path()).len(), 1);
    }

    #[test]
    fn finds_json5_workspaces() {
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("app")).unwrap();
        fs::write(root.path().join("app/package.json5"), "{ name: 'app' }").unwrap();

        let workspaces = find_workspaces(root.path());
        assert_eq!(workspaces.len(), 1);
        assert_eq!(workspaces[0].name(), Some("app"));
    }
}
