//! # demfetch - DEM tile resolution and caching
//!
//! Resolve geographic coordinates to SRTM `.hgt` tiles published by remote
//! DEM catalogs, download the archive holding a tile only when it is not
//! cached yet, extract it safely, and sample elevations from the local copy.
//!
//! ## Features
//!
//! - **Catalogs as data**: viewfinderpanoramas (indexed sheets), gpxsee and
//!   ESA (one archive per tile) are table entries; custom mirrors are a
//!   [`Catalog`] value away
//! - **Fetch once**: cached tiles are served from disk, and concurrent misses
//!   on the same archive share a single download
//! - **Contained cache**: archive entries that would land outside the cache
//!   root are skipped
//! - **Pluggable**: HTTP transport ([`ArchiveFetcher`]) and raster decoding
//!   ([`ElevationDecoder`]) are traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use demfetch::SrtmServiceBuilder;
//!
//! let service = SrtmServiceBuilder::new("/tmp/dem-cache").build()?;
//! let elevation = service.get_elevation(45.5, 13.5)?;
//! println!("{}m from {}", elevation.meters, elevation.dataset);
//! # Ok::<(), demfetch::DemError>(())
//! ```
//!
//! Resolution alone never touches the network:
//!
//! ```
//! use demfetch::{Catalog, TileResolver};
//!
//! let resolver = TileResolver::new(Catalog::viewfinder()?)?;
//! let tile = resolver.resolve(-32.0, 152.0).unwrap();
//! assert_eq!(tile.archive_group, "SH56");
//! assert_eq!(tile.source_url, "http://viewfinderpanoramas.org/dem3/SH56.zip");
//! # Ok::<(), demfetch::DemError>(())
//! ```
//!
//! ## Tile Format
//!
//! - **SRTM1**: 3601×3601 samples, 1 arc-second (~30m)
//! - **SRTM3**: 1201×1201 samples, 3 arc-second (~90m)
//!
//! Samples are big-endian `i16` meters; -32768 marks a void.

pub mod cache;
pub mod catalog;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod filename;
mod flight;
pub mod index;
pub mod resolver;
pub mod service;
pub mod tile;

pub use cache::{CachedTile, ExtractStats, LocalCache, TileKey};
pub use catalog::{CacheLayout, Catalog, CatalogKind, CatalogVariant, Partition, DEM1, DEM3};
pub use decode::{DecodeError, ElevationDecoder, HgtDecoder};
pub use error::{DemError, ErrorKind, Result};
pub use fetch::{ArchiveFetcher, FetchConfig};
pub use index::CatalogIndex;
pub use resolver::{ResolvedTile, TileLocator, TileResolver};
pub use service::{Elevation, FetchStats, SrtmService, SrtmServiceBuilder};
pub use tile::{SrtmResolution, SrtmTile, VOID_VALUE};

#[cfg(feature = "download")]
pub use fetch::HttpFetcher;
