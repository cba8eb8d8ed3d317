use anyhow::{Context, Result};
use demfetch::filename::filename_to_lat_lon;
use demfetch::SrtmResolution;

use super::ServiceArgs;

pub fn run(args: &ServiceArgs) -> Result<()> {
    let service = args.build_service()?;
    let cache = service.cache();

    let tiles = cache.list_tiles().context("Failed to read cache directory")?;

    if tiles.is_empty() {
        println!("No tiles cached in: {}", cache.root().display());
        return Ok(());
    }

    let mut srtm1_count = 0;
    let mut srtm3_count = 0;
    let mut unknown_count = 0;
    let mut total_size: u64 = 0;

    println!("{:<12} {:>12} {:>10}  LOCATION", "TILE", "TYPE", "SIZE");
    println!("{}", "-".repeat(60));

    for tile in &tiles {
        total_size += tile.size;

        let resolution = match SrtmResolution::from_len(tile.size) {
            Some(SrtmResolution::Srtm1) => {
                srtm1_count += 1;
                "SRTM1"
            }
            Some(SrtmResolution::Srtm3) => {
                srtm3_count += 1;
                "SRTM3"
            }
            None => {
                unknown_count += 1;
                "???"
            }
        };

        let name = match filename_to_lat_lon(&tile.file) {
            Some(_) => tile.file.clone(),
            None => format!("{}*", tile.file),
        };
        let location = tile
            .path
            .parent()
            .and_then(|dir| dir.strip_prefix(cache.root()).ok())
            .map(|dir| dir.display().to_string())
            .unwrap_or_default();

        println!(
            "{:<12} {:>12} {:>10}  {}",
            name,
            resolution,
            format_size(tile.size),
            if location.is_empty() { "." } else { location.as_str() }
        );
    }

    println!();
    println!("Summary:");
    println!("  Total tiles: {}", tiles.len());
    if srtm1_count > 0 {
        println!("  SRTM1 (30m): {}", srtm1_count);
    }
    if srtm3_count > 0 {
        println!("  SRTM3 (90m): {}", srtm3_count);
    }
    if unknown_count > 0 {
        println!("  Unknown: {}", unknown_count);
    }
    println!("  Total size: {}", format_size(total_size));
    println!("  Catalog: {}", service.catalog().name);
    println!("  Cache directory: {}", cache.root().display());

    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match bytes {
        b if b >= GB => format!("{:.2} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.2} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.2} KB", b as f64 / KB as f64),
        b => format!("{} B", b),
    }
}
