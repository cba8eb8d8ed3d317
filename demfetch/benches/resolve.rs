use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use demfetch::{
    ArchiveFetcher, Catalog, DemError, SrtmServiceBuilder, TileKey, TileResolver, DEM1,
};
use tempfile::TempDir;

const SRTM3_SAMPLES: usize = 1201;

#[derive(Debug)]
struct Offline;

impl ArchiveFetcher for Offline {
    fn fetch(&self, url: &str, _timeout: Option<Duration>) -> demfetch::Result<Vec<u8>> {
        Err(DemError::Fetch {
            url: url.to_string(),
            reason: "offline".to_string(),
        })
    }
}

/// Synthetic SRTM3 raster with a simple gradient.
fn gradient_tile() -> Vec<u8> {
    let mut data = vec![0u8; SRTM3_SAMPLES * SRTM3_SAMPLES * 2];
    for row in 0..SRTM3_SAMPLES {
        for col in 0..SRTM3_SAMPLES {
            let offset = (row * SRTM3_SAMPLES + col) * 2;
            let elev = ((row + col) % 4000) as i16;
            data[offset..offset + 2].copy_from_slice(&elev.to_be_bytes());
        }
    }
    data
}

fn bench_resolve(c: &mut Criterion) {
    let viewfinder = TileResolver::new(Catalog::viewfinder().unwrap()).unwrap();
    c.bench_function("resolve_viewfinder", |b| {
        b.iter(|| viewfinder.resolve(black_box(45.5), black_box(13.5)));
    });

    let esa = TileResolver::new(Catalog::esa()).unwrap();
    c.bench_function("resolve_esa", |b| {
        b.iter(|| esa.resolve(black_box(-0.1), black_box(0.0)));
    });
}

fn bench_cached_lookup(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let service = SrtmServiceBuilder::new(tmp.path())
        .fetcher(Arc::new(Offline))
        .build()
        .unwrap();
    service
        .cache()
        .save(&TileKey::new(DEM1, "L33", "N45E013.hgt"), &gradient_tile())
        .unwrap();

    // Warm the decoder
    let _ = service.get_elevation(45.5, 13.5);

    c.bench_function("elevation_cached", |b| {
        b.iter(|| {
            black_box(
                service
                    .get_elevation(black_box(45.3606), black_box(13.7274))
                    .unwrap(),
            );
        });
    });

    let coords: Vec<(f64, f64)> = (0..100)
        .map(|i| (45.0 + i as f64 * 0.009, 13.0 + i as f64 * 0.009))
        .collect();

    c.bench_function("elevation_batch_100", |b| {
        b.iter(|| black_box(service.get_elevations(black_box(&coords))));
    });
}

criterion_group!(benches, bench_resolve, bench_cached_lookup);
criterion_main!(benches);
