use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PackageDistribution {
    pub integrity: Option<String>,
    pub shasum: Option<String>,
    pub tarball: String,
    #[serde(alias = "unpackedSize")]
    pub unpacked_size: Option<u64>,
}
