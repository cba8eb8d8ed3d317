use anyhow::{Context, Result};
use demfetch::FetchStats;
use serde::Serialize;

use super::ServiceArgs;

#[derive(Serialize)]
struct ElevationResponse<'a> {
    lat: f64,
    lon: f64,
    elevation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dataset: Option<&'a str>,
    stats: FetchStats,
}

pub fn run(args: &ServiceArgs, lat: f64, lon: f64, json: bool) -> Result<()> {
    let service = args.build_service()?;

    let elevation = match service.get_elevation(lat, lon) {
        Ok(elevation) => Some(elevation),
        Err(e) if e.is_not_found() => {
            tracing::debug!(error = %e, "No elevation");
            None
        }
        Err(e) => return Err(e).context("Failed to get elevation"),
    };

    if json {
        let response = ElevationResponse {
            lat,
            lon,
            elevation: elevation.as_ref().map(|e| e.meters),
            dataset: elevation.as_ref().map(|e| e.dataset.as_str()),
            stats: service.stats(),
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        match elevation {
            Some(elevation) => println!("{} ({})", elevation.meters, elevation.dataset),
            None => println!("void"),
        }
    }

    Ok(())
}
