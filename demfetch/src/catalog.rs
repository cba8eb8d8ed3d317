//! Remote DEM catalogs.
//!
//! A [`Catalog`] is plain configuration: how tiles are partitioned, where the
//! archives live, and how the extracted files are laid out in the local cache.
//! The resolver never branches on a catalog's identity, so a new provider is
//! added by describing it here (or building a [`Catalog`] at runtime).
//!
//! # Data Sources
//!
//! | Catalog | Partitioning | Archive URL |
//! |---------|--------------|-------------|
//! | [`CatalogKind::Viewfinder`] | indexed sheets (`L33`, `SH56`, ...) | `http://viewfinderpanoramas.org/{partition}/{group}.zip` |
//! | [`CatalogKind::Gpxsee`] | one archive per tile, latitude folders | `http://dem.gpxsee.org/{lat}/{tile}.zip` |
//! | [`CatalogKind::Esa`] | one archive per tile | `https://step.esa.int/auxdata/dem/SRTMGL1/{stem}.SRTMGL1.hgt.zip` |
//!
//! # URL Template Placeholders
//!
//! - `{base}` - the catalog base URL
//! - `{partition}` - dataset tag (e.g., "dem1")
//! - `{group}` - archive group id
//! - `{tile}` - tile filename (e.g., "N45E013.hgt")
//! - `{stem}` - tile filename without extension (e.g., "N45E013")
//! - `{lat}` - latitude token (e.g., "N45")
//! - `{lon}` - longitude token (e.g., "E013")

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{DemError, Result};
use crate::filename::strip_hgt_extension;
use crate::index::CatalogIndex;

/// Dataset tag for 1 arc-second (~30m) data.
pub const DEM1: &str = "dem1";

/// Dataset tag for 3 arc-second (~90m) data.
pub const DEM3: &str = "dem3";

const VIEWFINDER_URL: &str = "http://viewfinderpanoramas.org/";
const GPXSEE_URL: &str = "http://dem.gpxsee.org/";
const ESA_URL: &str = "https://step.esa.int/auxdata/dem/SRTMGL1/";

// A handful of sheets only. Worldwide coverage needs index files loaded at
// runtime, see `Catalog::viewfinder_from_files`.
const SAMPLE_DEM1_INDEX: &str = include_str!("../data/sample_viewfinder_dem1.json");
const SAMPLE_DEM3_INDEX: &str = include_str!("../data/sample_viewfinder_dem3.json");

/// How a catalog maps a tile to the archive that contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogVariant {
    /// Tiles are bundled into irregular groups; a [`CatalogIndex`] per
    /// partition is needed to find the group.
    GridIndexed,
    /// One archive per tile, grouped in latitude-band folders.
    FlatNamed,
    /// One archive per tile, named after the full tile stem.
    DirectUrl,
}

/// Directory layout of extracted tiles beneath the cache root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLayout {
    /// `root/{partition}/{group}/{tile}`. Archive entries are extracted
    /// relative to `root/{partition}`.
    Grouped,
    /// `root/{tile}`. Archive entries are extracted relative to `root`.
    Flat,
}

/// One dataset of a catalog, such as `dem1` or `dem3`.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Dataset tag reported alongside elevations.
    pub tag: String,
    /// Group index. Empty for catalogs that do not need one.
    pub index: CatalogIndex,
}

impl Partition {
    /// A partition without an index.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            index: CatalogIndex::default(),
        }
    }

    /// A partition backed by a group index.
    pub fn indexed(tag: impl Into<String>, index: CatalogIndex) -> Self {
        Self {
            tag: tag.into(),
            index,
        }
    }
}

/// Static description of a remote DEM catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Short name, also used as the default cache subdirectory.
    pub name: String,
    /// Partitioning scheme.
    pub variant: CatalogVariant,
    /// Base URL substituted for `{base}`.
    pub base_url: String,
    /// Archive URL template.
    pub url_template: String,
    /// Local layout of extracted tiles.
    pub layout: CacheLayout,
    /// Partitions in lookup order, finest first.
    pub partitions: Vec<Partition>,
}

impl Catalog {
    /// Create a catalog with no partitions.
    pub fn new(
        name: impl Into<String>,
        variant: CatalogVariant,
        base_url: impl Into<String>,
        url_template: impl Into<String>,
    ) -> Self {
        let layout = match variant {
            CatalogVariant::GridIndexed => CacheLayout::Grouped,
            CatalogVariant::FlatNamed | CatalogVariant::DirectUrl => CacheLayout::Flat,
        };
        Self {
            name: name.into(),
            variant,
            base_url: base_url.into(),
            url_template: url_template.into(),
            layout,
            partitions: Vec::new(),
        }
    }

    /// Append a partition. Partitions are tried in the order they are added.
    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partitions.push(partition);
        self
    }

    /// Override the cache layout.
    pub fn with_layout(mut self, layout: CacheLayout) -> Self {
        self.layout = layout;
        self
    }

    /// viewfinderpanoramas.org: `dem1` sheets first, `dem3` as fallback.
    ///
    /// Backed by the bundled **sample** indices, which list only a few sheets
    /// (L33, SH56, K29, S21, G17). Anything else resolves to nothing. Use
    /// [`Catalog::viewfinder_from_files`] for real coverage.
    pub fn viewfinder() -> Result<Self> {
        Self::viewfinder_from_files(None, None)
    }

    /// viewfinderpanoramas.org with indices loaded from JSON files.
    ///
    /// A partition whose path is `None` falls back to its sample index.
    ///
    /// # Errors
    ///
    /// - [`DemError::Io`] if an index file cannot be read
    /// - [`DemError::Catalog`] if an index file is not valid JSON
    pub fn viewfinder_from_files(dem1: Option<&Path>, dem3: Option<&Path>) -> Result<Self> {
        Ok(Self::viewfinder_with_indices(
            load_index(DEM1, dem1, SAMPLE_DEM1_INDEX)?,
            load_index(DEM3, dem3, SAMPLE_DEM3_INDEX)?,
        ))
    }

    /// viewfinderpanoramas.org with caller-supplied indices.
    pub fn viewfinder_with_indices(dem1: CatalogIndex, dem3: CatalogIndex) -> Self {
        Self::new(
            CatalogKind::Viewfinder.name(),
            CatalogVariant::GridIndexed,
            VIEWFINDER_URL,
            "{base}{partition}/{group}.zip",
        )
        .with_partition(Partition::indexed(DEM1, dem1))
        .with_partition(Partition::indexed(DEM3, dem3))
    }

    /// dem.gpxsee.org: per-tile archives in latitude folders.
    pub fn gpxsee() -> Self {
        Self::new(
            CatalogKind::Gpxsee.name(),
            CatalogVariant::FlatNamed,
            GPXSEE_URL,
            "{base}{lat}/{tile}.zip",
        )
        .with_partition(Partition::new(DEM1))
    }

    /// ESA SNAP auxdata mirror of SRTMGL1.
    pub fn esa() -> Self {
        Self::new(
            CatalogKind::Esa.name(),
            CatalogVariant::DirectUrl,
            ESA_URL,
            "{base}{stem}.SRTMGL1.hgt.zip",
        )
        .with_partition(Partition::new(DEM1))
    }

    /// Check that the catalog can resolve anything at all.
    pub fn validate(&self) -> Result<()> {
        if self.partitions.is_empty() {
            return Err(DemError::Catalog(format!(
                "catalog '{}' has no partitions",
                self.name
            )));
        }
        if self.url_template.is_empty() {
            return Err(DemError::Catalog(format!(
                "catalog '{}' has no URL template",
                self.name
            )));
        }
        Ok(())
    }

    /// Render the archive URL for one tile.
    pub fn render_url(&self, fields: &UrlFields<'_>) -> String {
        let stem = strip_hgt_extension(fields.tile);

        self.url_template
            .replace("{base}", &self.base_url)
            .replace("{partition}", fields.partition)
            .replace("{group}", fields.group)
            .replace("{tile}", fields.tile)
            .replace("{stem}", stem)
            .replace("{lat}", fields.lat)
            .replace("{lon}", fields.lon)
    }
}

fn load_index(partition: &str, path: Option<&Path>, sample: &str) -> Result<CatalogIndex> {
    match path {
        Some(path) => {
            let index = CatalogIndex::from_json_path(path)?;
            tracing::debug!(
                partition,
                path = %path.display(),
                groups = index.group_count(),
                tiles = index.tile_count(),
                "Loaded catalog index"
            );
            Ok(index)
        }
        None => {
            tracing::warn!(partition, "No index file configured, using the bundled sample index");
            CatalogIndex::from_json(sample)
        }
    }
}

/// Values substituted into a catalog URL template.
#[derive(Debug, Clone, Copy)]
pub struct UrlFields<'a> {
    pub partition: &'a str,
    pub group: &'a str,
    pub tile: &'a str,
    pub lat: &'a str,
    pub lon: &'a str,
}

/// The built-in catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogKind {
    /// viewfinderpanoramas.org
    #[default]
    Viewfinder,
    /// dem.gpxsee.org
    Gpxsee,
    /// step.esa.int SRTMGL1
    Esa,
}

impl CatalogKind {
    /// All built-in catalogs.
    pub const ALL: [CatalogKind; 3] = [CatalogKind::Viewfinder, CatalogKind::Gpxsee, CatalogKind::Esa];

    /// Short name used in configuration and cache paths.
    pub fn name(&self) -> &'static str {
        match self {
            CatalogKind::Viewfinder => "viewfinder",
            CatalogKind::Gpxsee => "gpxsee",
            CatalogKind::Esa => "esa",
        }
    }

    /// Build the catalog description.
    pub fn catalog(&self) -> Result<Catalog> {
        match self {
            CatalogKind::Viewfinder => Catalog::viewfinder(),
            CatalogKind::Gpxsee => Ok(Catalog::gpxsee()),
            CatalogKind::Esa => Ok(Catalog::esa()),
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CatalogKind {
    type Err = DemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewfinder" | "viewfinderpanoramas" => Ok(CatalogKind::Viewfinder),
            "gpxsee" => Ok(CatalogKind::Gpxsee),
            "esa" => Ok(CatalogKind::Esa),
            other => Err(DemError::Catalog(format!(
                "unknown catalog '{}' (expected one of: viewfinder, gpxsee, esa)",
                other
            ))),
        }
    }
}
