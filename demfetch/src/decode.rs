//! Elevation sampling from cached tile files.
//!
//! The service hands a tile path and a coordinate to an [`ElevationDecoder`]
//! and gets back meters. [`HgtDecoder`] reads raw `.hgt` rasters and keeps
//! recently used tiles mapped in a bounded LRU cache. A mapping is reused only
//! while the file on disk is still the one that was mapped.

use std::fmt;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use moka::sync::Cache;
use thiserror::Error;

use crate::filename::filename_to_lat_lon;
use crate::tile::SrtmTile;

/// Default number of decoded tiles kept in memory.
pub const DEFAULT_TILE_CACHE_SIZE: u64 = 32;

/// Failures of an [`ElevationDecoder`].
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The sample at the coordinate is void.
    #[error("void sample")]
    NoData,

    /// The coordinate does not fall inside the tile.
    #[error("coordinate lat={lat}, lon={lon} is outside the tile")]
    OutOfTile { lat: f64, lon: f64 },

    /// The file is not a raster this decoder understands.
    #[error("invalid tile format: {0}")]
    InvalidFormat(String),

    /// The file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Reads an elevation out of a local tile file.
pub trait ElevationDecoder: Send + Sync + fmt::Debug {
    /// Elevation in meters at `(lat, lon)` from the tile at `path`.
    fn decode(&self, path: &Path, lat: f64, lon: f64) -> Result<f64, DecodeError>;

    /// Forget anything held for `path`, called after the file is replaced.
    fn invalidate(&self, _path: &Path) {}
}

/// Identity of a file on disk, used to notice that a path now names a
/// different file than the one mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
    inode: u64,
}

impl FileStamp {
    fn of(meta: &Metadata) -> Self {
        #[cfg(unix)]
        let inode = {
            use std::os::unix::fs::MetadataExt;
            meta.ino()
        };
        #[cfg(not(unix))]
        let inode = 0;

        Self {
            len: meta.len(),
            modified: meta.modified().ok(),
            inode,
        }
    }
}

#[derive(Clone)]
struct MappedTile {
    tile: Arc<SrtmTile>,
    stamp: FileStamp,
}

/// Nearest-neighbour decoder for `.hgt` files.
#[derive(Clone)]
pub struct HgtDecoder {
    tiles: Cache<PathBuf, MappedTile>,
}

impl HgtDecoder {
    /// Create a decoder keeping at most `capacity` tiles mapped.
    pub fn new(capacity: u64) -> Self {
        Self {
            tiles: Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// Number of tiles currently mapped.
    pub fn entry_count(&self) -> u64 {
        self.tiles.entry_count()
    }

    fn tile(&self, path: &Path, lat: f64, lon: f64) -> Result<Arc<SrtmTile>, DecodeError> {
        let stamp = FileStamp::of(&fs::metadata(path)?);
        if let Some(mapped) = self.tiles.get(path) {
            if mapped.stamp == stamp {
                return Ok(mapped.tile);
            }
            tracing::debug!(path = %path.display(), "Tile replaced on disk, remapping");
            self.tiles.invalidate(path);
        }

        // Tiles from an archive keep their canonical name; fall back to the
        // queried cell for anything else.
        let (base_lat, base_lon) = path
            .file_name()
            .and_then(|name| filename_to_lat_lon(&name.to_string_lossy()))
            .unwrap_or((lat.floor() as i32, lon.floor() as i32));

        let tile = Arc::new(SrtmTile::open(path, base_lat, base_lon)?);
        tracing::debug!(
            path = %path.display(),
            resolution = tile.resolution().label(),
            "Mapped tile"
        );
        self.tiles.insert(
            path.to_path_buf(),
            MappedTile {
                tile: tile.clone(),
                stamp,
            },
        );
        Ok(tile)
    }
}

impl Default for HgtDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_CACHE_SIZE)
    }
}

impl fmt::Debug for HgtDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HgtDecoder")
            .field("capacity", &self.tiles.policy().max_capacity())
            .finish()
    }
}

impl ElevationDecoder for HgtDecoder {
    fn decode(&self, path: &Path, lat: f64, lon: f64) -> Result<f64, DecodeError> {
        let tile = self.tile(path, lat, lon)?;
        Ok(f64::from(tile.sample(lat, lon)?))
    }

    fn invalidate(&self, path: &Path) {
        self.tiles.invalidate(path);
    }
}
