//! Archive-group indices for grid-indexed catalogs.
//!
//! Some catalogs bundle tiles into irregular archive groups (for example the
//! viewfinderpanoramas `L33.zip` sheet holds two dozen tiles around the
//! Adriatic). A [`CatalogIndex`] answers "which archive holds this tile" for
//! one partition of such a catalog.
//!
//! The on-disk format is a JSON object mapping group ids to tile names:
//!
//! ```json
//! { "L33": ["N44E012.hgt", "N45E013.hgt"], "S21": ["n72w056.hgt"] }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use crate::error::{DemError, Result};

/// Reverse index from tile name to the archive group containing it.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    /// Group id -> tile names, as spelled in the source data.
    groups: BTreeMap<String, BTreeSet<String>>,
    /// Lowercased tile name -> (group id, tile name as spelled).
    by_tile: HashMap<String, (String, String)>,
}

/// Result of a successful index lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHit<'a> {
    /// Archive group id (e.g., `"L33"`).
    pub group: &'a str,
    /// Tile filename exactly as listed in the index.
    pub tile_file: &'a str,
}

impl CatalogIndex {
    /// Build an index from `(group, tiles)` pairs.
    ///
    /// A tile listed under several groups resolves to the lexicographically
    /// smallest group id.
    pub fn new<G, T, I>(groups: impl IntoIterator<Item = (G, I)>) -> Self
    where
        G: Into<String>,
        T: Into<String>,
        I: IntoIterator<Item = T>,
    {
        let groups: BTreeMap<String, BTreeSet<String>> = groups
            .into_iter()
            .map(|(group, tiles)| (group.into(), tiles.into_iter().map(Into::into).collect()))
            .collect();

        let mut by_tile = HashMap::new();
        for (group, tiles) in &groups {
            for tile in tiles {
                by_tile
                    .entry(tile.to_ascii_lowercase())
                    .or_insert_with(|| (group.clone(), tile.clone()));
            }
        }

        Self { groups, by_tile }
    }

    /// Parse an index from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json)
            .map_err(|e| DemError::Catalog(format!("invalid index JSON: {}", e)))?;
        Ok(Self::new(raw))
    }

    /// Load an index from a JSON file.
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json).map_err(|e| match e {
            DemError::Catalog(reason) => {
                DemError::Catalog(format!("{}: {}", path.as_ref().display(), reason))
            }
            other => other,
        })
    }

    /// Find the archive group holding `tile_name` (case-insensitive).
    pub fn lookup(&self, tile_name: &str) -> Option<IndexHit<'_>> {
        self.by_tile
            .get(&tile_name.to_ascii_lowercase())
            .map(|(group, tile_file)| IndexHit {
                group: group.as_str(),
                tile_file: tile_file.as_str(),
            })
    }

    /// Tiles listed for `group`, if the group exists.
    pub fn tiles_in(&self, group: &str) -> Option<impl Iterator<Item = &str>> {
        self.groups.get(group).map(|tiles| tiles.iter().map(String::as_str))
    }

    /// Number of archive groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of distinct tiles (case-insensitive).
    pub fn tile_count(&self) -> usize {
        self.by_tile.len()
    }

    /// Returns `true` if the index has no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CatalogIndex {
        CatalogIndex::new([
            ("L33", vec!["N45E013.hgt", "N44E013.hgt"]),
            ("S21", vec!["n72w056.hgt"]),
        ])
    }

    #[test]
    fn test_lookup() {
        let index = sample();
        let hit = index.lookup("N45E013.hgt").unwrap();
        assert_eq!(hit.group, "L33");
        assert_eq!(hit.tile_file, "N45E013.hgt");
        assert!(index.lookup("N00E000.hgt").is_none());
    }

    #[test]
    fn test_lookup_case_insensitive() {
        let index = sample();
        let hit = index.lookup("N72W056.hgt").unwrap();
        assert_eq!(hit.group, "S21");
        // The index spelling is returned, since that is what the archive holds
        assert_eq!(hit.tile_file, "n72w056.hgt");

        assert_eq!(index.lookup("n45e013.HGT").unwrap().group, "L33");
    }

    #[test]
    fn test_duplicate_membership_prefers_smallest_group() {
        let index = CatalogIndex::new([
            ("M33", vec!["N45E013.hgt"]),
            ("L33", vec!["N45E013.hgt"]),
            ("K33", vec!["n45e013.hgt"]),
        ]);
        let hit = index.lookup("N45E013.hgt").unwrap();
        assert_eq!(hit.group, "K33");
        assert_eq!(hit.tile_file, "n45e013.hgt");
    }

    #[test]
    fn test_from_json() {
        let index =
            CatalogIndex::from_json(r#"{"G17": ["N25W080.hgt", "N25W081.hgt"], "SH56": ["S32E152.hgt"]}"#)
                .unwrap();
        assert_eq!(index.group_count(), 2);
        assert_eq!(index.tile_count(), 3);
        assert_eq!(index.lookup("S32E152.hgt").unwrap().group, "SH56");

        let mut tiles: Vec<_> = index.tiles_in("G17").unwrap().collect();
        tiles.sort();
        assert_eq!(tiles, vec!["N25W080.hgt", "N25W081.hgt"]);
    }

    #[test]
    fn test_from_json_invalid() {
        let result = CatalogIndex::from_json("[1, 2, 3]");
        assert!(matches!(result, Err(DemError::Catalog(_))));
    }

    #[test]
    fn test_from_json_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dem3.json");
        std::fs::write(&path, r#"{"L33": ["N45E013.hgt"]}"#).unwrap();

        let index = CatalogIndex::from_json_path(&path).unwrap();
        assert_eq!(index.lookup("N45E013.hgt").unwrap().group, "L33");

        let missing = CatalogIndex::from_json_path(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(DemError::Io(_))));
    }

    #[test]
    fn test_empty() {
        let index = CatalogIndex::default();
        assert!(index.is_empty());
        assert!(index.lookup("N45E013.hgt").is_none());
    }
}
