use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use jmod_tarball::{ArchiveFormat, ChecksumFormat};

use crate::package_version::RegistryVersion;

/// A registry-returned descriptor of a chosen version, carrying everything
/// the cache needs to fetch and verify its archive. Tagged by source; `npm`
/// is the only source today.
#[derive(Debug, Clone)]
pub enum Resolveable {
    Npm(RegistryVersion),
}

impl Resolveable {
    pub fn name(&self) -> &str {
        match self {
            Resolveable::Npm(version) => version.name.as_str(),
        }
    }

    pub fn version(&self) -> String {
        match self {
            Resolveable::Npm(version) => version.version.to_string(),
        }
    }

    pub fn source_url(&self) -> &str {
        match self {
            Resolveable::Npm(version) => version.tarball_url(),
        }
    }

    pub fn source_format(&self) -> ArchiveFormat {
        match self {
            Resolveable::Npm(_) => ArchiveFormat::TarGz,
        }
    }

    /// Checksum format declared by the integrity string, `None` when the
    /// registry offered no format the cache can verify.
    pub fn checksum_format(&self) -> Option<ChecksumFormat> {
        let integrity = self.integrity()?;
        if integrity.starts_with("sha512-") {
            Some(ChecksumFormat::Sha512)
        } else if integrity.starts_with("sha256-") {
            Some(ChecksumFormat::Sha256)
        } else {
            None
        }
    }

    /// Raw checksum bytes decoded from the integrity string.
    pub fn checksum(&self) -> Option<Vec<u8>> {
        let integrity = self.integrity()?;
        let encoded = integrity.get(7..)?;
        general_purpose::STANDARD.decode(encoded).ok()
    }

    fn integrity(&self) -> Option<&str> {
        match self {
            Resolveable::Npm(version) => version.dist.integrity.as_deref(),
        }
    }
}

impl fmt::Display for Resolveable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolveable::Npm(version) => {
                write!(f, "npm:{}@{}", version.name, version.version)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_distribution::PackageDistribution;
    use pretty_assertions::assert_eq;

    fn resolveable(integrity: Option<&str>) -> Resolveable {
        Resolveable::Npm(RegistryVersion {
            name: "leftpad".to_string(),
            version: "1.3.1".parse().unwrap(),
            dist: PackageDistribution {
                integrity: integrity.map(str::to_string),
                shasum: None,
                tarball: "https://registry.npmjs.org/leftpad/-/leftpad-1.3.1.tgz".to_string(),
                unpacked_size: None,
            },
        })
    }

    #[test]
    fn sha512_integrity_is_recognized() {
        let raw: Vec<u8> = (0u8..64).collect();
        let integrity =
            format!("sha512-{}", base64::engine::general_purpose::STANDARD.encode(&raw));
        let resolveable = resolveable(Some(&integrity));
        assert_eq!(resolveable.checksum_format(), Some(ChecksumFormat::Sha512));
        assert_eq!(resolveable.checksum().unwrap(), raw);
    }

    #[test]
    fn sha256_integrity_is_recognized() {
        let raw: Vec<u8> = (0u8..32).collect();
        let integrity =
            format!("sha256-{}", base64::engine::general_purpose::STANDARD.encode(&raw));
        assert_eq!(resolveable(Some(&integrity)).checksum_format(), Some(ChecksumFormat::Sha256));
    }

    #[test]
    fn unknown_integrity_prefix_yields_none() {
        assert_eq!(resolveable(Some("sha1-YWJj")).checksum_format(), None);
        assert_eq!(resolveable(None).checksum_format(), None);
    }

    #[test]
    fn display_includes_source() {
        assert_eq!(resolveable(None).to_string(), "npm:leftpad@1.3.1");
    }
}
