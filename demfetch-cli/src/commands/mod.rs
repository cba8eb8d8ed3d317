use anyhow::{Context, Result};
use clap::Args;
use demfetch::{Catalog, CatalogKind, SrtmService, SrtmServiceBuilder};
use std::path::PathBuf;

pub mod batch;
pub mod cache;
pub mod query;
pub mod resolve;

/// Options shared by every command that talks to the service.
#[derive(Args)]
pub struct ServiceArgs {
    /// Cache directory (defaults to ~/.cache/demfetch/<catalog>)
    #[arg(short = 'd', long, env = "DEMFETCH_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Catalog to download from: viewfinder, gpxsee or esa
    #[arg(
        short,
        long,
        env = "DEMFETCH_CATALOG",
        default_value = "viewfinder",
        global = true
    )]
    pub catalog: String,

    /// HTTP timeout in seconds
    #[arg(
        short,
        long,
        env = "DEMFETCH_TIMEOUT_SECS",
        default_value = "300",
        global = true
    )]
    pub timeout: u64,

    /// viewfinder dem1 index file (JSON: sheet -> tile names)
    #[arg(long, env = "DEMFETCH_DEM1_INDEX", global = true)]
    pub dem1_index: Option<PathBuf>,

    /// viewfinder dem3 index file (JSON: sheet -> tile names)
    #[arg(long, env = "DEMFETCH_DEM3_INDEX", global = true)]
    pub dem3_index: Option<PathBuf>,
}

impl ServiceArgs {
    pub fn catalog_kind(&self) -> Result<CatalogKind> {
        self.catalog
            .parse()
            .with_context(|| format!("Invalid --catalog '{}'", self.catalog))
    }

    /// The selected catalog, with viewfinder index files applied.
    pub fn catalog(&self) -> Result<Catalog> {
        match self.catalog_kind()? {
            CatalogKind::Viewfinder => Catalog::viewfinder_from_files(
                self.dem1_index.as_deref(),
                self.dem3_index.as_deref(),
            )
            .context("Failed to load viewfinder index files"),
            kind => Ok(kind.catalog()?),
        }
    }

    pub fn build_service(&self) -> Result<SrtmService> {
        let mut builder = SrtmServiceBuilder::from_env()
            .context("Failed to read DEMFETCH_* environment")?
            .catalog_kind(self.catalog_kind()?)
            .timeout_secs(self.timeout);

        if let Some(dir) = &self.cache_dir {
            builder = builder.cache_dir(dir);
        }
        if let Some(path) = &self.dem1_index {
            builder = builder.dem1_index(path);
        }
        if let Some(path) = &self.dem3_index {
            builder = builder.dem3_index(path);
        }

        builder.build().context("Failed to create elevation service")
    }
}
