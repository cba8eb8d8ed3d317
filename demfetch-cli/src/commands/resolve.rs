use anyhow::{Context, Result};
use demfetch::{ResolvedTile, TileResolver};
use serde::Serialize;

use super::ServiceArgs;

#[derive(Serialize)]
struct ResolveResponse<'a> {
    lat: f64,
    lon: f64,
    catalog: &'static str,
    #[serde(flatten)]
    tile: &'a ResolvedTile,
}

pub fn run(args: &ServiceArgs, lat: f64, lon: f64, json: bool) -> Result<()> {
    // Resolution is offline; no need for a cache directory or HTTP client
    let kind = args.catalog_kind()?;
    let resolver = TileResolver::new(args.catalog()?).context("Failed to load catalog")?;

    let Some(tile) = resolver.resolve(lat, lon) else {
        if json {
            println!("null");
        } else {
            println!("No {} tile covers lat={}, lon={}", kind, lat, lon);
        }
        return Ok(());
    };

    if json {
        let response = ResolveResponse {
            lat,
            lon,
            catalog: kind.name(),
            tile: &tile,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        println!("Catalog: {}", kind);
        println!("Dataset: {}", tile.dem_partition);
        println!("Group:   {}", tile.archive_group);
        println!("Tile:    {}", tile.tile_file);
        println!("URL:     {}", tile.source_url);
    }

    Ok(())
}
