mod checksum;
mod error;
mod extract;
mod path;

pub use checksum::{constant_time_eq, normalize_expected, ChecksumError, ChecksumFormat, Hasher};
pub use error::TarballError;
pub use extract::{extract_archive, ArchiveFormat};
pub use path::{normalize_tar_path, secure_join};
