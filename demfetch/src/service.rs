//! Elevation service: resolve, fetch on miss, extract, decode.
//!
//! [`SrtmService`] is the entry point of the library. For each coordinate it
//! resolves the covering tile against its catalog, downloads and extracts the
//! archive only when the tile is not already cached, and samples the cached
//! file.
//!
//! ```no_run
//! use demfetch::{CatalogKind, SrtmServiceBuilder};
//!
//! let service = SrtmServiceBuilder::new("/data/dem")
//!     .catalog_kind(CatalogKind::Viewfinder)
//!     .build()?;
//!
//! // Downloads dem1/L33.zip on first use, then reads from disk
//! let elevation = service.get_elevation(45.5, 13.5)?;
//! println!("{}m ({})", elevation.meters, elevation.dataset);
//! # Ok::<(), demfetch::DemError>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::cache::{LocalCache, TileKey};
use crate::catalog::{Catalog, CatalogKind, CatalogVariant};
use crate::decode::{DecodeError, ElevationDecoder, HgtDecoder, DEFAULT_TILE_CACHE_SIZE};
use crate::error::{DemError, Result};
use crate::fetch::{ArchiveFetcher, DEFAULT_TIMEOUT_SECS};
use crate::flight::{FlightGroup, Joined};
use crate::resolver::{ResolvedTile, TileResolver};

#[cfg(feature = "download")]
use crate::fetch::{FetchConfig, HttpFetcher};

/// An elevation sample and the dataset it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Elevation {
    /// Height above sea level in meters.
    pub meters: f64,
    /// Partition tag of the source tile (e.g., "dem1").
    pub dataset: String,
}

/// Counters describing how lookups were served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    /// Lookups answered from the disk cache without a download.
    pub cache_hits: u64,
    /// Archives downloaded.
    pub downloads: u64,
    /// Total archive bytes downloaded.
    pub bytes_downloaded: u64,
}

/// Fetch-on-miss elevation service for one catalog.
///
/// `SrtmService` is `Send + Sync`; share it behind an `Arc` and call it from
/// any number of threads. Concurrent misses on the same archive download it
/// once.
pub struct SrtmService {
    resolver: TileResolver,
    cache: LocalCache,
    fetcher: Arc<dyn ArchiveFetcher>,
    decoder: Arc<dyn ElevationDecoder>,
    /// In-flight downloads keyed by archive URL.
    flights: FlightGroup<String>,
    cache_hits: AtomicU64,
    downloads: AtomicU64,
    bytes_downloaded: AtomicU64,
}

impl SrtmService {
    /// Create a builder caching tiles under `cache_dir`.
    pub fn builder<P: AsRef<Path>>(cache_dir: P) -> SrtmServiceBuilder {
        SrtmServiceBuilder::new(cache_dir)
    }

    /// The tile covering `(lat, lon)`, without touching the network or disk.
    pub fn resolve(&self, lat: f64, lon: f64) -> Option<ResolvedTile> {
        self.resolver.resolve(lat, lon)
    }

    /// Elevation at `(lat, lon)` in meters.
    ///
    /// # Errors
    ///
    /// - [`DemError::NotFound`] if the catalog has no tile here (no download
    ///   is attempted)
    /// - [`DemError::Fetch`] / [`DemError::Http`] on transport failure
    /// - [`DemError::CorruptArchive`] if the download is not a zip archive
    /// - [`DemError::TileMissing`] if the archive lacked the tile
    /// - [`DemError::NoData`] for a void sample
    /// - [`DemError::Decode`] if the tile cannot be read
    pub fn get_elevation(&self, lat: f64, lon: f64) -> Result<Elevation> {
        self.elevation(lat, lon, None)
    }

    /// Like [`get_elevation`](Self::get_elevation), but any download must
    /// start before `deadline` and is cut off when it passes.
    ///
    /// A caller that finds the archive already being downloaded by another
    /// thread waits for that download regardless of its own deadline.
    pub fn get_elevation_with_deadline(
        &self,
        lat: f64,
        lon: f64,
        deadline: Instant,
    ) -> Result<Elevation> {
        self.elevation(lat, lon, Some(deadline))
    }

    /// Elevations for many coordinates, one result per input, in order.
    pub fn get_elevations(&self, coords: &[(f64, f64)]) -> Vec<Result<Elevation>> {
        coords
            .iter()
            .map(|&(lat, lon)| self.get_elevation(lat, lon))
            .collect()
    }

    /// Make sure the tile for `(lat, lon)` is cached and return its path.
    ///
    /// The path stays valid for as long as the cache directory is left alone.
    pub fn ensure_tile(&self, lat: f64, lon: f64) -> Result<(ResolvedTile, PathBuf)> {
        self.ensure(lat, lon, None)
    }

    /// Store `bytes` as the cached tile for `key` and drop any decoded copy
    /// of the file it replaces.
    pub fn save_tile(&self, key: &TileKey, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.cache.save(key, bytes)?;
        self.decoder.invalidate(&path);
        Ok(path)
    }

    /// Current counters.
    pub fn stats(&self) -> FetchStats {
        FetchStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            downloads: self.downloads.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
        }
    }

    /// The disk cache.
    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// The catalog lookups resolve against.
    pub fn catalog(&self) -> &Catalog {
        self.resolver.catalog()
    }

    fn elevation(&self, lat: f64, lon: f64, deadline: Option<Instant>) -> Result<Elevation> {
        let (tile, path) = self.ensure(lat, lon, deadline)?;

        match self.decoder.decode(&path, lat, lon) {
            Ok(meters) => Ok(Elevation {
                meters,
                dataset: tile.dem_partition,
            }),
            Err(DecodeError::NoData) => Err(DemError::NoData { lat, lon }),
            Err(source) => Err(DemError::Decode { path, source }),
        }
    }

    fn ensure(
        &self,
        lat: f64,
        lon: f64,
        deadline: Option<Instant>,
    ) -> Result<(ResolvedTile, PathBuf)> {
        let tile = self
            .resolver
            .resolve(lat, lon)
            .ok_or(DemError::NotFound { lat, lon })?;
        let key = tile.key();

        if let Some(path) = self.cache.exists(&key) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(tile = %tile.tile_file, path = %path.display(), "Cache hit");
            return Ok((tile, path));
        }

        match self
            .flights
            .run(&tile.source_url, || self.download(&tile, &key, deadline))
        {
            Joined::Led(result) => result?,
            Joined::Followed(Ok(())) => {}
            Joined::Followed(Err(reason)) => {
                return Err(DemError::Fetch {
                    url: tile.source_url.clone(),
                    reason,
                })
            }
        }

        match self.cache.exists(&key) {
            Some(path) => Ok((tile, path)),
            None => Err(DemError::TileMissing {
                path: self.cache.path_for(&key),
            }),
        }
    }

    /// Download and extract the archive holding `key`. Runs at most once at a
    /// time per archive.
    fn download(&self, tile: &ResolvedTile, key: &TileKey, deadline: Option<Instant>) -> Result<()> {
        // A download that finished just before we took the lead
        if self.cache.exists(key).is_some() {
            return Ok(());
        }

        let timeout = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if deadline <= now {
                    return Err(DemError::DeadlineExceeded {
                        url: tile.source_url.clone(),
                    });
                }
                Some(deadline - now)
            }
            None => None,
        };

        tracing::debug!(
            tile = %tile.tile_file,
            group = %tile.archive_group,
            dataset = %tile.dem_partition,
            "Cache miss"
        );

        let bytes = self.fetcher.fetch(&tile.source_url, timeout)?;
        self.downloads.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);

        let stats = self.cache.extract_archive(&tile.dem_partition, &bytes)?;
        tracing::info!(
            url = %tile.source_url,
            bytes = bytes.len(),
            written = stats.written,
            skipped = stats.skipped,
            failed = stats.failed,
            "Extracted archive"
        );

        self.decoder.invalidate(&self.cache.path_for(key));
        Ok(())
    }
}

/// Builder for [`SrtmService`].
///
/// ```no_run
/// use demfetch::{CatalogKind, SrtmServiceBuilder};
///
/// let service = SrtmServiceBuilder::new("/data/dem")
///     .catalog_kind(CatalogKind::Esa)
///     .timeout_secs(60)
///     .tile_cache_size(8)
///     .build()?;
/// # Ok::<(), demfetch::DemError>(())
/// ```
pub struct SrtmServiceBuilder {
    cache_dir: Option<PathBuf>,
    catalog: Option<Catalog>,
    catalog_kind: CatalogKind,
    dem1_index: Option<PathBuf>,
    dem3_index: Option<PathBuf>,
    fetcher: Option<Arc<dyn ArchiveFetcher>>,
    decoder: Option<Arc<dyn ElevationDecoder>>,
    timeout_secs: u64,
    tile_cache_size: u64,
}

impl SrtmServiceBuilder {
    /// Create a new builder caching tiles under `cache_dir`.
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self {
            cache_dir: Some(cache_dir.as_ref().to_path_buf()),
            ..Self::unconfigured()
        }
    }

    fn unconfigured() -> Self {
        Self {
            cache_dir: None,
            catalog: None,
            catalog_kind: CatalogKind::default(),
            dem1_index: None,
            dem3_index: None,
            fetcher: None,
            decoder: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            tile_cache_size: DEFAULT_TILE_CACHE_SIZE,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `DEMFETCH_CACHE_DIR` | Cache root | `$HOME/.cache/demfetch/<catalog>` |
    /// | `DEMFETCH_CATALOG` | `viewfinder`, `gpxsee` or `esa` | `viewfinder` |
    /// | `DEMFETCH_DEM1_INDEX` | viewfinder `dem1` index JSON | bundled sample |
    /// | `DEMFETCH_DEM3_INDEX` | viewfinder `dem3` index JSON | bundled sample |
    /// | `DEMFETCH_TIMEOUT_SECS` | HTTP timeout | 300 |
    /// | `DEMFETCH_TILE_CACHE_SIZE` | Decoded tiles kept in memory | 32 |
    ///
    /// # Errors
    ///
    /// Returns [`DemError::Catalog`] if `DEMFETCH_CATALOG` names an unknown
    /// catalog.
    pub fn from_env() -> Result<Self> {
        let catalog_kind = match std::env::var("DEMFETCH_CATALOG") {
            Ok(name) => name.parse()?,
            Err(_) => CatalogKind::default(),
        };

        let timeout_secs = std::env::var("DEMFETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let tile_cache_size = std::env::var("DEMFETCH_TILE_CACHE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TILE_CACHE_SIZE);

        Ok(Self {
            cache_dir: std::env::var_os("DEMFETCH_CACHE_DIR").map(PathBuf::from),
            catalog_kind,
            dem1_index: std::env::var_os("DEMFETCH_DEM1_INDEX").map(PathBuf::from),
            dem3_index: std::env::var_os("DEMFETCH_DEM3_INDEX").map(PathBuf::from),
            timeout_secs,
            tile_cache_size,
            ..Self::unconfigured()
        })
    }

    /// Set the cache root.
    pub fn cache_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use a custom catalog. Takes precedence over
    /// [`catalog_kind`](Self::catalog_kind).
    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Use one of the built-in catalogs.
    pub fn catalog_kind(mut self, kind: CatalogKind) -> Self {
        self.catalog_kind = kind;
        self
    }

    /// Load the viewfinder `dem1` index from a JSON file.
    pub fn dem1_index<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.dem1_index = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load the viewfinder `dem3` index from a JSON file.
    pub fn dem3_index<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.dem3_index = Some(path.as_ref().to_path_buf());
        self
    }

    /// Replace the HTTP fetcher.
    pub fn fetcher(mut self, fetcher: Arc<dyn ArchiveFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Replace the `.hgt` decoder.
    pub fn decoder(mut self, decoder: Arc<dyn ElevationDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Set the HTTP timeout of the default fetcher.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set how many decoded tiles the default decoder keeps mapped.
    pub fn tile_cache_size(mut self, size: u64) -> Self {
        self.tile_cache_size = size;
        self
    }

    /// Build the [`SrtmService`].
    ///
    /// # Errors
    ///
    /// - [`DemError::Catalog`] if the catalog or an index file is invalid
    /// - [`DemError::Config`] if no cache directory was given and `$HOME` is
    ///   unset, or (without the `download` feature) no fetcher was supplied
    /// - [`DemError::Io`] if the cache root or an index file cannot be read
    pub fn build(self) -> Result<SrtmService> {
        let has_index_files = self.dem1_index.is_some() || self.dem3_index.is_some();
        let catalog = match (self.catalog, self.catalog_kind) {
            (Some(catalog), _) => catalog,
            (None, CatalogKind::Viewfinder) => Catalog::viewfinder_from_files(
                self.dem1_index.as_deref(),
                self.dem3_index.as_deref(),
            )?,
            (None, kind) => kind.catalog()?,
        };
        if has_index_files && catalog.variant != CatalogVariant::GridIndexed {
            tracing::warn!(catalog = %catalog.name, "Index files ignored for a catalog without indices");
        }

        let cache_dir = match self.cache_dir {
            Some(dir) => dir,
            None => default_cache_dir(&catalog.name)?,
        };

        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => default_fetcher(self.timeout_secs)?,
        };

        let decoder = self
            .decoder
            .unwrap_or_else(|| Arc::new(HgtDecoder::new(self.tile_cache_size)));

        let cache = LocalCache::new(&cache_dir, catalog.layout)?;
        tracing::debug!(
            catalog = %catalog.name,
            cache = %cache.root().display(),
            "Service ready"
        );

        Ok(SrtmService {
            resolver: TileResolver::new(catalog)?,
            cache,
            fetcher,
            decoder,
            flights: FlightGroup::new(),
            cache_hits: AtomicU64::new(0),
            downloads: AtomicU64::new(0),
            bytes_downloaded: AtomicU64::new(0),
        })
    }
}

/// `$HOME/.cache/demfetch/<catalog>`.
fn default_cache_dir(catalog: &str) -> Result<PathBuf> {
    let home = std::env::var_os("HOME").ok_or_else(|| {
        DemError::Config("no cache directory given and HOME is not set".to_string())
    })?;
    Ok(PathBuf::from(home)
        .join(".cache")
        .join("demfetch")
        .join(catalog))
}

#[cfg(feature = "download")]
fn default_fetcher(timeout_secs: u64) -> Result<Arc<dyn ArchiveFetcher>> {
    let fetcher = HttpFetcher::new(FetchConfig::default().with_timeout(timeout_secs))?;
    Ok(Arc::new(fetcher))
}

#[cfg(not(feature = "download"))]
fn default_fetcher(_timeout_secs: u64) -> Result<Arc<dyn ArchiveFetcher>> {
    Err(DemError::Config(
        "built without the `download` feature; supply a fetcher".to_string(),
    ))
}
