//! SRTM tile naming.
//!
//! This module maps coordinates to the canonical `.hgt` tile names used by
//! every DEM catalog, and back.
//!
//! # Filename Format
//!
//! Tiles follow the naming convention: `{N|S}{lat}{E|W}{lon}.hgt`
//!
//! - Latitude: 2 digits with N/S prefix (e.g., N45, S01)
//! - Longitude: 3 digits with E/W prefix (e.g., E013, W056)
//!
//! The name identifies the **southwest corner** of the 1° × 1° cell. The
//! coordinate is floored toward negative infinity before the absolute value is
//! taken, so `-0.1` lands in `S01`, not `S00`.

/// Latitude token of the cell containing `lat` (e.g., `"N45"`, `"S01"`).
///
/// # Examples
///
/// ```
/// use demfetch::filename::lat_token;
///
/// assert_eq!(lat_token(45.7), "N45");
/// assert_eq!(lat_token(-0.1), "S01");
/// assert_eq!(lat_token(0.0), "N00");
/// ```
pub fn lat_token(lat: f64) -> String {
    let prefix = if lat >= 0.0 { 'N' } else { 'S' };
    format!("{}{:02}", prefix, floored_magnitude(lat))
}

/// Longitude token of the cell containing `lon` (e.g., `"E013"`, `"W056"`).
///
/// # Examples
///
/// ```
/// use demfetch::filename::lon_token;
///
/// assert_eq!(lon_token(13.0), "E013");
/// assert_eq!(lon_token(-55.0033), "W056");
/// ```
pub fn lon_token(lon: f64) -> String {
    let prefix = if lon >= 0.0 { 'E' } else { 'W' };
    format!("{}{:03}", prefix, floored_magnitude(lon))
}

/// Convert latitude and longitude to the tile filename covering them.
///
/// # Examples
///
/// ```
/// use demfetch::filename::tile_file_for;
///
/// assert_eq!(tile_file_for(44.9, 13.0), "N44E013.hgt");
/// assert_eq!(tile_file_for(-32.0, 152.0), "S32E152.hgt");
/// assert_eq!(tile_file_for(-0.1, 0.0), "S01E000.hgt");
/// ```
pub fn tile_file_for(lat: f64, lon: f64) -> String {
    format!("{}{}.hgt", lat_token(lat), lon_token(lon))
}

/// Tile stem without extension (e.g., `"N45E013"`).
pub fn tile_stem_for(lat: f64, lon: f64) -> String {
    format!("{}{}", lat_token(lat), lon_token(lon))
}

fn floored_magnitude(value: f64) -> u32 {
    value.floor().abs() as u32
}

/// Remove a trailing `.hgt` (any case), if present.
pub(crate) fn strip_hgt_extension(name: &str) -> &str {
    match name.len().checked_sub(4) {
        Some(split) if name.is_char_boundary(split) && name[split..].eq_ignore_ascii_case(".hgt") => {
            &name[..split]
        }
        _ => name,
    }
}

/// Parse a tile filename to extract the southwest corner.
///
/// Accepts an optional directory prefix and an optional `.hgt` extension.
/// Hemisphere letters are matched case-insensitively.
///
/// # Examples
///
/// ```
/// use demfetch::filename::filename_to_lat_lon;
///
/// assert_eq!(filename_to_lat_lon("N45E013.hgt"), Some((45, 13)));
/// assert_eq!(filename_to_lat_lon("dem1/S21/n72w056.hgt"), Some((72, -56)));
/// assert_eq!(filename_to_lat_lon("invalid"), None);
/// ```
pub fn filename_to_lat_lon(filename: &str) -> Option<(i32, i32)> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    let name = strip_hgt_extension(name);

    // Must be exactly 7 characters: N00E000
    if name.len() != 7 || !name.is_ascii() {
        return None;
    }

    let bytes = name.as_bytes();

    let lat_sign = match bytes[0] {
        b'N' | b'n' => 1,
        b'S' | b's' => -1,
        _ => return None,
    };
    let lat = parse_digits(&name[1..3])?;

    let lon_sign = match bytes[3] {
        b'E' | b'e' => 1,
        b'W' | b'w' => -1,
        _ => return None,
    };
    let lon = parse_digits(&name[4..7])?;

    Some((lat * lat_sign, lon * lon_sign))
}

/// Unsigned decimal field. `str::parse` alone would also take `+1` or `-1`.
fn parse_digits(field: &str) -> Option<i32> {
    if !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}
