use serde::{Deserialize, Serialize};

use crate::package_distribution::PackageDistribution;

/// Metadata of one concrete version as returned by the registry.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegistryVersion {
    pub name: String,
    pub version: node_semver::Version,
    pub dist: PackageDistribution,
}

impl RegistryVersion {
    pub fn tarball_url(&self) -> &str {
        self.dist.tarball.as_str()
    }

    /// Version string as written into a manifest: exact versions as-is,
    /// `latest` resolutions become a caret range.
    pub fn serialize_spec(&self, requested_tag: &str) -> String {
        if requested_tag == "latest" {
            format!("^{}", self.version)
        } else {
            self.version.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn version(raw: &str) -> RegistryVersion {
        RegistryVersion {
            name: "leftpad".to_string(),
            version: raw.parse().unwrap(),
            dist: PackageDistribution {
                integrity: None,
                shasum: None,
                tarball: "https://registry.npmjs.org/leftpad/-/leftpad-1.0.0.tgz".to_string(),
                unpacked_size: None,
            },
        }
    }

    #[test]
    fn latest_serializes_as_caret_range() {
        assert_eq!(version("1.3.1").serialize_spec("latest"), "^1.3.1");
    }

    #[test]
    fn explicit_versions_serialize_verbatim() {
        assert_eq!(version("1.3.1").serialize_spec("1.3.1"), "1.3.1");
        assert_eq!(version("2.0.0-beta.1").serialize_spec("next"), "2.0.0-beta.1");
    }
}
