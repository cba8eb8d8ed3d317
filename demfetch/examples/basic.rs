//! Fetch elevations for a few landmarks, downloading tiles on first use.
//!
//! Run with: cargo run --example basic -- /path/to/cache [viewfinder|gpxsee|esa]

use demfetch::{CatalogKind, DemError, SrtmServiceBuilder};
use std::env;

fn main() -> Result<(), DemError> {
    let cache_dir = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example basic -- /path/to/cache [catalog]");
        std::process::exit(1);
    });
    let catalog: CatalogKind = match env::args().nth(2) {
        Some(name) => name.parse()?,
        None => CatalogKind::default(),
    };

    let service = SrtmServiceBuilder::new(&cache_dir)
        .catalog_kind(catalog)
        .build()?;

    let locations = [
        ("Trieste, Italy", 45.6495, 13.7768),
        ("Everglades, Florida", 25.2866, -80.8987),
        ("Blue Mountains, Australia", -31.5, 152.5),
        ("Pacific Ocean", 0.0, -150.0),
    ];

    println!("Elevation queries ({} catalog):", catalog);
    println!("{:-<50}", "");

    for (name, lat, lon) in &locations {
        match service.get_elevation(*lat, *lon) {
            Ok(elevation) => println!("{}: {}m ({})", name, elevation.meters, elevation.dataset),
            Err(e) if e.is_not_found() => println!("{}: no data", name),
            Err(e) => println!("{}: error - {}", name, e),
        }
    }

    let stats = service.stats();
    println!("\nCache hits: {}", stats.cache_hits);
    println!("Downloads: {}", stats.downloads);
    println!("Bytes downloaded: {}", stats.bytes_downloaded);

    Ok(())
}
