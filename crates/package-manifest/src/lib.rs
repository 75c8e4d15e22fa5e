mod workspace;

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use jmod_diagnostics::{
    miette::{self, Diagnostic},
    thiserror::{self, Error},
};
use serde_json::{json, Map, Value};
use strum::IntoStaticStr;

pub use workspace::{find_workspaces, IGNORE_DIRS, IGNORE_GLOBS};

#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum PackageManifestError {
    #[error(transparent)]
    #[diagnostic(code(jmod_package_manifest::serialization_error))]
    Serialization(#[from] serde_json::Error),

    #[error("parsing {path} failed: {error}")]
    #[diagnostic(code(jmod_package_manifest::json5_error))]
    Json5 { path: String, error: json5::Error },

    #[error(transparent)]
    #[diagnostic(code(jmod_package_manifest::io_error))]
    Io(#[from] std::io::Error),

    #[error("package.json file already exists")]
    #[diagnostic(
        code(jmod_package_manifest::already_exist_error),
        help("Your current working directory already has a package.json file.")
    )]
    AlreadyExist,

    #[error("invalid attribute: {0}")]
    #[diagnostic(code(jmod_package_manifest::invalid_attribute))]
    InvalidAttribute(String),

    #[error("no manifest file was found in {0}")]
    #[diagnostic(code(jmod_package_manifest::no_importer_manifest_found))]
    NoImporterManifestFound(String),

    #[error("missing script: {0:?}")]
    #[diagnostic(code(jmod_package_manifest::no_script_error))]
    NoScript(String),

    #[error("no such dependency: {0}")]
    #[diagnostic(code(jmod_package_manifest::no_such_dependency))]
    NoSuchDependency(String),

    #[error("bin is a string but the package has no name")]
    #[diagnostic(code(jmod_package_manifest::missing_bin_name))]
    MissingBinName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum DependencyGroup {
    #[strum(serialize = "dependencies")]
    Prod,
    #[strum(serialize = "devDependencies")]
    Dev,
    #[strum(serialize = "optionalDependencies")]
    Optional,
}

impl DependencyGroup {
    const ALL: [DependencyGroup; 3] =
        [DependencyGroup::Prod, DependencyGroup::Dev, DependencyGroup::Optional];
}

/// Manifest file names, tried in order during discovery.
pub const MANIFEST_FILE_NAMES: [&str; 3] = ["package.json", "package.json5", "package.jsonc"];

/// Content of a manifest file and its path. The path is the identity of the
/// workspace.
pub struct PackageManifest {
    path: PathBuf,
    value: Value,
}

impl PackageManifest {
    fn create_init_manifest() -> Value {
        json!({
            "scripts": {},
            "dependencies": {},
            "devDependencies": {}
        })
    }

    fn read_from_file(path: &Path) -> Result<Value, PackageManifestError> {
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|extension| extension.to_str()) {
            Some("json5") | Some("jsonc") => {
                json5::from_str(&contents).map_err(|error| PackageManifestError::Json5 {
                    path: path.display().to_string(),
                    error,
                })
            }
            _ => serde_json::from_str(&contents).map_err(PackageManifestError::from),
        }
    }

    /// Create a fresh `package.json` at `path`; errors when one exists.
    pub fn init(path: &Path) -> Result<(), PackageManifestError> {
        if path.exists() {
            return Err(PackageManifestError::AlreadyExist);
        }
        let contents = serde_json::to_string_pretty(&PackageManifest::create_init_manifest())?;
        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;
        Ok(())
    }

    pub fn from_path(path: PathBuf) -> Result<PackageManifest, PackageManifestError> {
        if !path.exists() {
            return Err(PackageManifestError::NoImporterManifestFound(path.display().to_string()));
        }
        let value = PackageManifest::read_from_file(&path)?;
        Ok(PackageManifest { path, value })
    }

    /// Open the manifest of `dir`, trying `package.json`, `package.json5`,
    /// and `package.jsonc` in that order.
    pub fn from_dir(dir: &Path) -> Result<PackageManifest, PackageManifestError> {
        for file_name in MANIFEST_FILE_NAMES {
            let path = dir.join(file_name);
            if path.is_file() {
                return PackageManifest::from_path(path);
            }
        }
        Err(PackageManifestError::NoImporterManifestFound(dir.display().to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the manifest.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn name(&self) -> Option<&str> {
        self.value.get("name").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.value.get("version").and_then(Value::as_str)
    }

    pub fn save(&self) -> Result<(), PackageManifestError> {
        let mut file = fs::File::create(&self.path)?;
        let contents = serde_json::to_string_pretty(&self.value)?;
        file.write_all(contents.as_bytes())?;
        Ok(())
    }

    /// Dependency entries of the requested groups as `(name, specifier)`
    /// pairs.
    pub fn dependencies<'a>(
        &'a self,
        groups: impl IntoIterator<Item = DependencyGroup> + 'a,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        groups
            .into_iter()
            .flat_map(|group| self.value.get::<&str>(group.into()))
            .flat_map(|dependencies| dependencies.as_object())
            .flatten()
            .flat_map(|(name, spec)| spec.as_str().map(|spec| (name.as_str(), spec)))
    }

    /// Insert a dependency into `group`, removing the name from every other
    /// group first: a name lives in at most one group.
    pub fn add_dependency(
        &mut self,
        name: &str,
        spec: &str,
        group: DependencyGroup,
    ) -> Result<(), PackageManifestError> {
        for other in DependencyGroup::ALL {
            if other == group {
                continue;
            }
            let key: &str = other.into();
            if let Some(entries) = self.value.get_mut(key).and_then(Value::as_object_mut) {
                entries.remove(name);
            }
        }

        let key: &str = group.into();
        if let Some(field) = self.value.get_mut(key) {
            if let Some(entries) = field.as_object_mut() {
                entries.insert(name.to_string(), Value::String(spec.to_string()));
            } else {
                return Err(PackageManifestError::InvalidAttribute(format!(
                    "{key} attribute should be an object"
                )));
            }
        } else {
            let mut entries = Map::new();
            entries.insert(name.to_string(), Value::String(spec.to_string()));
            self.value[key] = Value::Object(entries);
        }
        Ok(())
    }

    /// Remove a dependency from every group. Errors when the name is not
    /// declared anywhere.
    pub fn remove_dependency(&mut self, name: &str) -> Result<(), PackageManifestError> {
        let mut removed = false;
        for group in DependencyGroup::ALL {
            let key: &str = group.into();
            if let Some(entries) = self.value.get_mut(key).and_then(Value::as_object_mut) {
                removed |= entries.remove(name).is_some();
            }
        }
        if removed {
            Ok(())
        } else {
            Err(PackageManifestError::NoSuchDependency(name.to_string()))
        }
    }

    pub fn script(
        &self,
        command: &str,
        if_present: bool,
    ) -> Result<Option<&str>, PackageManifestError> {
        if let Some(script) = self
            .value
            .get("scripts")
            .and_then(|scripts| scripts.get(command))
            .and_then(Value::as_str)
        {
            return Ok(Some(script));
        }

        if if_present {
            Ok(None)
        } else {
            Err(PackageManifestError::NoScript(command.to_string()))
        }
    }

    /// Executables declared by the `bin` field as `(name, relative path)`
    /// pairs. A bare string needs the package `name` as the bin name.
    pub fn bin_entries(&self) -> Result<Vec<(String, String)>, PackageManifestError> {
        let Some(bin) = self.value.get("bin") else {
            return Ok(Vec::new());
        };
        match bin {
            Value::Null => Ok(Vec::new()),
            Value::Object(entries) => {
                let mut bins = Vec::with_capacity(entries.len());
                for (bin_name, relative_path) in entries {
                    let Some(relative_path) = relative_path.as_str() else {
                        return Err(PackageManifestError::InvalidAttribute(
                            "bin entries should be strings".to_string(),
                        ));
                    };
                    bins.push((bin_name.clone(), relative_path.to_string()));
                }
                Ok(bins)
            }
            Value::String(relative_path) => {
                let name = self.name().ok_or(PackageManifestError::MissingBinName)?;
                Ok(vec![(name.to_string(), relative_path.clone())])
            }
            _ => Err(PackageManifestError::InvalidAttribute(
                "bin field has an unexpected JSON type".to_string(),
            )),
        }
    }
}
