//! Archive formats and their compressor table.

use std::fmt;
use std::str::FromStr;

use crate::archive::error::ArchiveError;

/// Supported archive containers.
///
/// Parsed once at the request boundary; everything downstream matches on the
/// variant instead of comparing extension strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArchiveFormat {
    Tar,
    #[default]
    TarGz,
    TarBz2,
    Zip,
}

impl ArchiveFormat {
    pub const ALL: [ArchiveFormat; 4] = [
        ArchiveFormat::Tar,
        ArchiveFormat::TarGz,
        ArchiveFormat::TarBz2,
        ArchiveFormat::Zip,
    ];

    /// file extension, without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::TarBz2 => "tar.bz2",
            ArchiveFormat::Zip => "zip",
        }
    }

    /// argv of the process the raw tar stream is piped through
    ///
    /// `None` for zip, which is written directly.
    pub fn compressor(&self) -> Option<&'static [&'static str]> {
        match self {
            ArchiveFormat::Tar => Some(&["cat"]),
            ArchiveFormat::TarGz => Some(&["gzip", "-n"]),
            ArchiveFormat::TarBz2 => Some(&["bzip2"]),
            ArchiveFormat::Zip => None,
        }
    }

    /// whether the container is a tar stream
    pub fn is_tar(&self) -> bool {
        self.compressor().is_some()
    }
}

impl FromStr for ArchiveFormat {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "tar" => Ok(ArchiveFormat::Tar),
            "tar.gz" | "tgz" | "gz" => Ok(ArchiveFormat::TarGz),
            "tar.bz2" | "tbz" | "tbz2" | "tb2" | "bz2" => Ok(ArchiveFormat::TarBz2),
            "zip" => Ok(ArchiveFormat::Zip),
            other => Err(ArchiveError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
