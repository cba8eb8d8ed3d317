//! Coordinate to archive resolution.
//!
//! [`TileResolver`] answers, for one catalog, which archive holds the tile
//! covering a coordinate and where to download it. The partitioning rule is a
//! [`TileLocator`] picked once from the catalog's [`CatalogVariant`].

use std::fmt;

use serde::Serialize;

use crate::cache::TileKey;
use crate::catalog::{Catalog, CatalogVariant, Partition, UrlFields};
use crate::error::Result;
use crate::filename::{lat_token, lon_token, tile_file_for, tile_stem_for};

/// Where a coordinate's tile lives, both remotely and in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTile {
    /// Dataset tag (e.g., "dem1").
    pub dem_partition: String,
    /// Archive group id (e.g., "L33", "N45", "N45E013").
    pub archive_group: String,
    /// Tile filename inside the archive.
    pub tile_file: String,
    /// Archive download URL.
    pub source_url: String,
}

impl ResolvedTile {
    /// Cache key of the tile.
    pub fn key(&self) -> TileKey {
        TileKey::new(&self.dem_partition, &self.archive_group, &self.tile_file)
    }
}

/// Partitioning rule of one catalog variant.
pub trait TileLocator: Send + Sync + fmt::Debug {
    /// Locate the tile for `(lat, lon)`, or `None` if the catalog has none.
    fn locate(&self, catalog: &Catalog, lat: f64, lon: f64) -> Option<ResolvedTile>;
}

/// Looks the tile up in each partition's index, finest partition first.
#[derive(Debug, Default)]
pub struct GridIndexedLocator;

impl TileLocator for GridIndexedLocator {
    fn locate(&self, catalog: &Catalog, lat: f64, lon: f64) -> Option<ResolvedTile> {
        let lookup = tile_file_for(lat, lon);

        catalog.partitions.iter().find_map(|partition| {
            let hit = partition.index.lookup(&lookup)?;
            Some(build(catalog, partition, hit.group, hit.tile_file, lat, lon))
        })
    }
}

/// One archive per tile, filed under its latitude band (`N45/N45E013.hgt.zip`).
#[derive(Debug, Default)]
pub struct FlatNamedLocator;

impl TileLocator for FlatNamedLocator {
    fn locate(&self, catalog: &Catalog, lat: f64, lon: f64) -> Option<ResolvedTile> {
        let partition = catalog.partitions.first()?;
        let tile = tile_file_for(lat, lon);
        Some(build(catalog, partition, &lat_token(lat), &tile, lat, lon))
    }
}

/// One archive per tile, named after the full stem (`N45E013.SRTMGL1.hgt.zip`).
#[derive(Debug, Default)]
pub struct DirectUrlLocator;

impl TileLocator for DirectUrlLocator {
    fn locate(&self, catalog: &Catalog, lat: f64, lon: f64) -> Option<ResolvedTile> {
        let partition = catalog.partitions.first()?;
        let tile = tile_file_for(lat, lon);
        Some(build(
            catalog,
            partition,
            &tile_stem_for(lat, lon),
            &tile,
            lat,
            lon,
        ))
    }
}

fn build(
    catalog: &Catalog,
    partition: &Partition,
    group: &str,
    tile: &str,
    lat: f64,
    lon: f64,
) -> ResolvedTile {
    let lat_tok = lat_token(lat);
    let lon_tok = lon_token(lon);
    let source_url = catalog.render_url(&UrlFields {
        partition: &partition.tag,
        group,
        tile,
        lat: &lat_tok,
        lon: &lon_tok,
    });

    ResolvedTile {
        dem_partition: partition.tag.clone(),
        archive_group: group.to_string(),
        tile_file: tile.to_string(),
        source_url,
    }
}

/// Resolves coordinates against one catalog.
#[derive(Debug)]
pub struct TileResolver {
    catalog: Catalog,
    locator: Box<dyn TileLocator>,
}

impl TileResolver {
    /// Create a resolver, choosing the locator from the catalog variant.
    ///
    /// # Errors
    ///
    /// Returns [`DemError::Catalog`](crate::DemError::Catalog) if the catalog
    /// has no partitions or no URL template.
    pub fn new(catalog: Catalog) -> Result<Self> {
        catalog.validate()?;
        let locator: Box<dyn TileLocator> = match catalog.variant {
            CatalogVariant::GridIndexed => Box::new(GridIndexedLocator),
            CatalogVariant::FlatNamed => Box::new(FlatNamedLocator),
            CatalogVariant::DirectUrl => Box::new(DirectUrlLocator),
        };
        Ok(Self { catalog, locator })
    }

    /// Create a resolver with a custom partitioning rule.
    pub fn with_locator(catalog: Catalog, locator: Box<dyn TileLocator>) -> Result<Self> {
        catalog.validate()?;
        Ok(Self { catalog, locator })
    }

    /// Resolve the tile covering `(lat, lon)`.
    ///
    /// Returns `None` when no tile covers the coordinate. Non-finite
    /// coordinates never resolve.
    pub fn resolve(&self, lat: f64, lon: f64) -> Option<ResolvedTile> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        self.locator.locate(&self.catalog, lat, lon)
    }

    /// The catalog this resolver works against.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DEM1, DEM3};
    use crate::index::CatalogIndex;

    fn viewfinder() -> TileResolver {
        TileResolver::new(Catalog::viewfinder().unwrap()).unwrap()
    }

    fn check(resolver: &TileResolver, lat: f64, lon: f64, group: &str, file: &str, dem: &str) {
        let tile = resolver
            .resolve(lat, lon)
            .unwrap_or_else(|| panic!("no tile for ({}, {})", lat, lon));
        assert_eq!(tile.archive_group, group, "group for ({}, {})", lat, lon);
        assert_eq!(tile.tile_file, file, "file for ({}, {})", lat, lon);
        assert_eq!(tile.dem_partition, dem, "dem for ({}, {})", lat, lon);
    }

    #[test]
    fn test_viewfinder_resolution() {
        let resolver = viewfinder();
        check(&resolver, 45.0, 13.0, "L33", "N45E013.hgt", DEM1);
        check(&resolver, 45.1, 13.0, "L33", "N45E013.hgt", DEM1);
        check(&resolver, 44.9, 13.0, "L33", "N44E013.hgt", DEM1);
        check(&resolver, 45.0, 13.1, "L33", "N45E013.hgt", DEM1);
        check(&resolver, 45.0, 12.9, "L33", "N45E012.hgt", DEM1);
        check(&resolver, 25.0, -80.0, "G17", "N25W080.hgt", DEM3);
        check(&resolver, 25.0, -80.1, "G17", "N25W081.hgt", DEM1);
        check(&resolver, 25.0, -79.9, "G17", "N25W080.hgt", DEM3);
        check(&resolver, 25.1, -80.0, "G17", "N25W080.hgt", DEM3);
        check(&resolver, -32.0, 152.0, "SH56", "S32E152.hgt", DEM3);
        check(&resolver, 72.2342, -55.0033, "S21", "n72w056.hgt", DEM1);
    }

    #[test]
    fn test_viewfinder_source_url() {
        let resolver = viewfinder();
        let tile = resolver.resolve(45.5, 13.5).unwrap();
        assert_eq!(tile.source_url, "http://viewfinderpanoramas.org/dem1/L33.zip");

        let tile = resolver.resolve(-31.5, 152.5).unwrap();
        assert_eq!(tile.source_url, "http://viewfinderpanoramas.org/dem3/SH56.zip");
    }

    #[test]
    fn test_uncovered_coordinate() {
        let resolver = viewfinder();
        assert!(resolver.resolve(0.0, 0.0).is_none());
        assert!(resolver.resolve(0.0, -150.0).is_none());
        assert!(resolver.resolve(f64::NAN, 13.0).is_none());
    }

    #[test]
    fn test_finer_partition_wins() {
        let catalog = Catalog::viewfinder_with_indices(
            CatalogIndex::new([("FINE", vec!["N10E010.hgt"])]),
            CatalogIndex::new([("COARSE", vec!["N10E010.hgt", "N11E010.hgt"])]),
        );
        let resolver = TileResolver::new(catalog).unwrap();

        check(&resolver, 10.5, 10.5, "FINE", "N10E010.hgt", DEM1);
        check(&resolver, 11.5, 10.5, "COARSE", "N11E010.hgt", DEM3);
    }

    #[test]
    fn test_gpxsee_resolution() {
        let resolver = TileResolver::new(Catalog::gpxsee()).unwrap();
        let tile = resolver.resolve(43.37012643, -8.39114853).unwrap();
        assert_eq!(tile.dem_partition, DEM1);
        assert_eq!(tile.archive_group, "N43");
        assert_eq!(tile.tile_file, "N43W009.hgt");
        assert_eq!(tile.source_url, "http://dem.gpxsee.org/N43/N43W009.hgt.zip");

        // No index: every finite coordinate resolves
        let tile = resolver.resolve(0.0, -150.0).unwrap();
        assert_eq!(tile.tile_file, "N00W150.hgt");
    }

    #[test]
    fn test_esa_resolution() {
        let resolver = TileResolver::new(Catalog::esa()).unwrap();
        let tile = resolver.resolve(-0.1, 0.0).unwrap();
        assert_eq!(tile.archive_group, "S01E000");
        assert_eq!(tile.tile_file, "S01E000.hgt");
        assert_eq!(
            tile.source_url,
            "https://step.esa.int/auxdata/dem/SRTMGL1/S01E000.SRTMGL1.hgt.zip"
        );
    }

    #[test]
    fn test_key() {
        let resolver = viewfinder();
        let key = resolver.resolve(45.5, 13.5).unwrap().key();
        assert_eq!(key, TileKey::new(DEM1, "L33", "N45E013.hgt"));
    }

    #[test]
    fn test_invalid_catalog_rejected() {
        let catalog = Catalog::new("empty", CatalogVariant::DirectUrl, "http://x/", "{base}{tile}");
        assert!(TileResolver::new(catalog).is_err());
    }

    #[test]
    fn test_custom_locator() {
        #[derive(Debug)]
        struct Nowhere;
        impl TileLocator for Nowhere {
            fn locate(&self, _: &Catalog, _: f64, _: f64) -> Option<ResolvedTile> {
                None
            }
        }

        let resolver = TileResolver::with_locator(Catalog::esa(), Box::new(Nowhere)).unwrap();
        assert!(resolver.resolve(45.0, 13.0).is_none());
    }
}
