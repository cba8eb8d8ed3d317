//! Error types for the demfetch library.

use std::path::PathBuf;
use thiserror::Error;

use crate::decode::DecodeError;

/// Broad category of a [`DemError`].
///
/// Callers that only care about "is there data here or not" can match on
/// this instead of the individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No tile or no sample covers the coordinate. Expected, not a fault.
    NotFound,
    /// Network failure or non-success HTTP response.
    Fetch,
    /// Archive bytes could not be parsed.
    CorruptArchive,
    /// Local filesystem failure.
    Io,
    /// The raster decoder rejected the tile.
    Decode,
    /// Invalid catalog or service configuration.
    Config,
}

/// Errors that can occur while resolving, fetching, and sampling DEM tiles.
#[derive(Error, Debug)]
pub enum DemError {
    /// No configured catalog has a tile for the coordinate.
    #[error("No DEM tile covers lat={lat}, lon={lon}")]
    NotFound { lat: f64, lon: f64 },

    /// The archive was fetched but did not contain the expected tile.
    #[error("Tile not present in cache after extraction: {path}")]
    TileMissing { path: PathBuf },

    /// The tile exists but holds a void sample at the coordinate.
    #[error("No elevation data at lat={lat}, lon={lon}")]
    NoData { lat: f64, lon: f64 },

    /// Download failed with a non-success status or transport problem.
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// HTTP client error.
    #[cfg(feature = "download")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The caller's deadline passed before the download could start.
    #[error("Deadline exceeded before fetching {url}")]
    DeadlineExceeded { url: String },

    /// Archive could not be read as a zip container.
    #[error("Corrupt archive: {0}")]
    CorruptArchive(#[from] zip::result::ZipError),

    /// IO error when reading or writing the cache.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The raster decoder failed on a cached tile.
    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    /// Catalog table or index data is invalid.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// The service was configured inconsistently.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DemError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DemError::NotFound { .. } | DemError::TileMissing { .. } | DemError::NoData { .. } => {
                ErrorKind::NotFound
            }
            DemError::Fetch { .. } | DemError::DeadlineExceeded { .. } => ErrorKind::Fetch,
            #[cfg(feature = "download")]
            DemError::Http(_) => ErrorKind::Fetch,
            DemError::CorruptArchive(_) => ErrorKind::CorruptArchive,
            DemError::Io(_) => ErrorKind::Io,
            DemError::Decode { .. } => ErrorKind::Decode,
            DemError::Catalog(_) | DemError::Config(_) => ErrorKind::Config,
        }
    }

    /// Returns `true` if the error means "no data here" rather than a fault.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result type alias using [`DemError`].
pub type Result<T> = std::result::Result<T, DemError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DemError::NotFound {
            lat: 0.0,
            lon: -150.5,
        };
        assert!(err.to_string().contains("-150.5"));

        let err = DemError::TileMissing {
            path: PathBuf::from("dem1/L33/N45E013.hgt"),
        };
        assert!(err.to_string().contains("N45E013.hgt"));

        let err = DemError::Fetch {
            url: "http://example.com/L33.zip".to_string(),
            reason: "HTTP 404 Not Found".to_string(),
        };
        assert!(err.to_string().contains("L33.zip"));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_error_kind() {
        assert!(DemError::NotFound { lat: 0.0, lon: 0.0 }.is_not_found());
        assert!(DemError::NoData { lat: 0.0, lon: 0.0 }.is_not_found());
        assert!(DemError::TileMissing {
            path: PathBuf::from("x.hgt")
        }
        .is_not_found());

        let err = DemError::Fetch {
            url: String::new(),
            reason: String::new(),
        };
        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert!(!err.is_not_found());

        let err = DemError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert_eq!(err.kind(), ErrorKind::Io);

        let err = DemError::CorruptArchive(zip::result::ZipError::InvalidArchive("bad".into()));
        assert_eq!(err.kind(), ErrorKind::CorruptArchive);

        let err = DemError::Decode {
            path: PathBuf::from("N00E000.hgt"),
            source: DecodeError::InvalidFormat("size 10".to_string()),
        };
        assert_eq!(err.kind(), ErrorKind::Decode);
    }
}
