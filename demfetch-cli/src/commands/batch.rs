use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::ServiceArgs;

pub fn run(
    args: &ServiceArgs,
    input: PathBuf,
    output: Option<PathBuf>,
    lat_col: &str,
    lon_col: &str,
) -> Result<()> {
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if extension != "csv" {
        bail!("Unsupported file format: {}. Use .csv", extension);
    }

    let service = args.build_service()?;

    let file = File::open(&input).context("Failed to open input file")?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let lat_idx = headers
        .iter()
        .position(|h| h == lat_col)
        .with_context(|| format!("Column '{}' not found in CSV", lat_col))?;
    let lon_idx = headers
        .iter()
        .position(|h| h == lon_col)
        .with_context(|| format!("Column '{}' not found in CSV", lon_col))?;

    let records: Vec<_> = reader.records().collect::<Result<_, _>>()?;

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let output_path = output.unwrap_or_else(|| default_output(&input));
    let output_file = File::create(&output_path).context("Failed to create output file")?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(output_file));

    let mut new_headers: Vec<&str> = headers.iter().collect();
    new_headers.extend(["elevation", "dataset"]);
    writer.write_record(&new_headers)?;

    let mut failures = 0u64;
    for (line, record) in records.iter().enumerate() {
        let lat = parse_coord(record.get(lat_idx), "latitude", line)?;
        let lon = parse_coord(record.get(lon_idx), "longitude", line)?;

        let (elevation, dataset) = match service.get_elevation(lat, lon) {
            Ok(elevation) => (elevation.meters.to_string(), elevation.dataset),
            Err(e) => {
                if !e.is_not_found() {
                    failures += 1;
                    tracing::warn!(lat, lon, error = %e, "Lookup failed");
                }
                ("void".to_string(), String::new())
            }
        };

        let mut new_record: Vec<&str> = record.iter().collect();
        new_record.push(&elevation);
        new_record.push(&dataset);
        writer.write_record(&new_record)?;

        pb.inc(1);
    }

    pb.finish_with_message("done");
    writer.flush()?;

    let stats = service.stats();
    println!("Output written to: {}", output_path.display());
    println!(
        "Downloads: {} ({} bytes), cache hits: {}, failed lookups: {}",
        stats.downloads, stats.bytes_downloaded, stats.cache_hits, failures
    );
    Ok(())
}

fn parse_coord(field: Option<&str>, name: &str, line: usize) -> Result<f64> {
    field
        .with_context(|| format!("Missing {} on record {}", name, line + 1))?
        .trim()
        .parse()
        .with_context(|| format!("Invalid {} on record {}", name, line + 1))
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_elevation.csv", stem))
}
