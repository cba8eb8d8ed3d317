//! `.hgt` raster access.
//!
//! An `.hgt` file is a square grid of big-endian `i16` samples stored north to
//! south, west to east. The grid size is implied by the file length.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::decode::DecodeError;

/// Samples per side of a 1 arc-second tile.
const SRTM1_SAMPLES: usize = 3601;

/// Samples per side of a 3 arc-second tile.
const SRTM3_SAMPLES: usize = 1201;

const SRTM1_SIZE: usize = SRTM1_SAMPLES * SRTM1_SAMPLES * 2;
const SRTM3_SIZE: usize = SRTM3_SAMPLES * SRTM3_SAMPLES * 2;

/// Sample value marking a void (no data).
pub const VOID_VALUE: i16 = -32768;

/// Grid resolution of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrtmResolution {
    /// 1 arc-second (~30m)
    Srtm1,
    /// 3 arc-second (~90m)
    Srtm3,
}

impl SrtmResolution {
    /// Number of samples per row/column.
    pub fn samples(&self) -> usize {
        match self {
            SrtmResolution::Srtm1 => SRTM1_SAMPLES,
            SrtmResolution::Srtm3 => SRTM3_SAMPLES,
        }
    }

    /// Detect the resolution from a file length in bytes.
    pub fn from_len(len: u64) -> Option<Self> {
        match usize::try_from(len).ok()? {
            SRTM1_SIZE => Some(SrtmResolution::Srtm1),
            SRTM3_SIZE => Some(SrtmResolution::Srtm3),
            _ => None,
        }
    }

    /// Short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            SrtmResolution::Srtm1 => "SRTM1 (30m)",
            SrtmResolution::Srtm3 => "SRTM3 (90m)",
        }
    }
}

/// A memory-mapped `.hgt` tile anchored at its southwest corner.
pub struct SrtmTile {
    data: Mmap,
    resolution: SrtmResolution,
    base_lat: i32,
    base_lon: i32,
}

impl SrtmTile {
    /// Map `path` as the tile whose southwest corner is `(base_lat, base_lon)`.
    ///
    /// # Errors
    ///
    /// [`DecodeError::InvalidFormat`] if the file length is neither the SRTM1
    /// nor the SRTM3 size.
    pub fn open<P: AsRef<Path>>(path: P, base_lat: i32, base_lon: i32) -> Result<Self, DecodeError> {
        let file = File::open(&path)?;

        // SAFETY: the mapping is read-only and private to this struct.
        // `LocalCache` replaces tiles by rename and never truncates in place,
        // so a replaced tile leaves this mapping's inode intact.
        let data = unsafe { Mmap::map(&file)? };

        let resolution = SrtmResolution::from_len(data.len() as u64).ok_or_else(|| {
            DecodeError::InvalidFormat(format!("unexpected file size {} bytes", data.len()))
        })?;

        Ok(Self {
            data,
            resolution,
            base_lat,
            base_lon,
        })
    }

    /// Nearest sample to `(lat, lon)`.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::OutOfTile`] if the coordinate is outside this tile
    /// - [`DecodeError::NoData`] if the sample is void
    pub fn sample(&self, lat: f64, lon: f64) -> Result<i16, DecodeError> {
        let lat_frac = lat - self.base_lat as f64;
        let lon_frac = lon - self.base_lon as f64;

        if !(0.0..=1.0).contains(&lat_frac) || !(0.0..=1.0).contains(&lon_frac) {
            return Err(DecodeError::OutOfTile { lat, lon });
        }

        let last = (self.samples() - 1) as f64;
        // Row 0 is the northern edge
        let row = ((1.0 - lat_frac) * last).round() as usize;
        let col = (lon_frac * last).round() as usize;

        match self.sample_at(row, col) {
            VOID_VALUE => Err(DecodeError::NoData),
            value => Ok(value),
        }
    }

    fn sample_at(&self, row: usize, col: usize) -> i16 {
        let samples = self.samples();
        let offset = (row.min(samples - 1) * samples + col.min(samples - 1)) * 2;
        i16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }

    /// Grid resolution.
    pub fn resolution(&self) -> SrtmResolution {
        self.resolution
    }

    /// Samples per row/column.
    pub fn samples(&self) -> usize {
        self.resolution.samples()
    }

    /// Southwest corner `(lat, lon)`.
    pub fn origin(&self) -> (i32, i32) {
        (self.base_lat, self.base_lon)
    }
}

impl std::fmt::Debug for SrtmTile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SrtmTile")
            .field("resolution", &self.resolution)
            .field("base_lat", &self.base_lat)
            .field("base_lon", &self.base_lon)
            .finish()
    }
}
