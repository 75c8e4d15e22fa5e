use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::package_version::RegistryVersion;

/// The full version listing of one package (`GET /<name>`).
#[derive(Serialize, Deserialize, Debug)]
pub struct Packument {
    pub name: String,
    #[serde(default, alias = "dist-tags")]
    pub dist_tags: HashMap<String, String>,
    pub versions: HashMap<String, RegistryVersion>,
}

impl Packument {
    /// The highest version satisfying `range`, if any.
    pub fn pinned_version(&self, range: &node_semver::Range) -> Option<&RegistryVersion> {
        self.versions
            .values()
            .filter(|candidate| candidate.version.satisfies(range))
            .max_by(|a, b| {
                a.version.partial_cmp(&b.version).expect("versions have a total order")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn packument() -> Packument {
        serde_json::from_str(
            r#"{
                "name": "leftpad",
                "dist-tags": { "latest": "1.3.1" },
                "versions": {
                    "1.2.0": {
                        "name": "leftpad",
                        "version": "1.2.0",
                        "dist": {
                            "integrity": "sha512-aGVzZWxsb3dvcmxkaGVzZWxsb3dvcmxkaGVzZWxsb3dvcmxkaGVzZWxsb3dvcmxkaGVzZWxsb3dvcmxkaGVC",
                            "shasum": "ab",
                            "tarball": "https://registry.npmjs.org/leftpad/-/leftpad-1.2.0.tgz"
                        }
                    },
                    "1.3.0": {
                        "name": "leftpad",
                        "version": "1.3.0",
                        "dist": {
                            "tarball": "https://registry.npmjs.org/leftpad/-/leftpad-1.3.0.tgz"
                        }
                    },
                    "1.3.1": {
                        "name": "leftpad",
                        "version": "1.3.1",
                        "dist": {
                            "tarball": "https://registry.npmjs.org/leftpad/-/leftpad-1.3.1.tgz"
                        }
                    },
                    "2.0.0": {
                        "name": "leftpad",
                        "version": "2.0.0",
                        "dist": {
                            "tarball": "https://registry.npmjs.org/leftpad/-/leftpad-2.0.0.tgz"
                        }
                    }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn picks_highest_satisfying_version() {
        let packument = packument();
        let range: node_semver::Range = "^1.3.0".parse().unwrap();
        let pinned = packument.pinned_version(&range).unwrap();
        assert_eq!(pinned.version.to_string(), "1.3.1");
    }

    #[test]
    fn range_covering_everything_picks_newest() {
        let packument = packument();
        let range: node_semver::Range = ">=1.0.0".parse().unwrap();
        assert_eq!(packument.pinned_version(&range).unwrap().version.to_string(), "2.0.0");
    }

    #[test]
    fn unsatisfiable_range_yields_none() {
        let packument = packument();
        let range: node_semver::Range = "^3.0.0".parse().unwrap();
        assert!(packument.pinned_version(&range).is_none());
    }
}
