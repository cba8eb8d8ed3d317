//! On-disk tile cache.
//!
//! [`LocalCache`] owns one directory (the cache root) and everything beneath
//! it. Downloaded archives are extracted here and tiles are looked up by
//! [`TileKey`]. Every path the cache writes is checked to stay inside the root
//! after lexical cleaning, so a crafted archive entry such as
//! `../../home/user/.bashrc` is skipped instead of written.

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use crate::catalog::CacheLayout;
use crate::error::Result;

/// Identity of a cached tile: `(partition, group, file)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Dataset tag (e.g., "dem1").
    pub partition: String,
    /// Archive group id.
    pub group: String,
    /// Tile filename.
    pub file: String,
}

impl TileKey {
    /// Create a new key.
    pub fn new(
        partition: impl Into<String>,
        group: impl Into<String>,
        file: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            group: group.into(),
            file: file.into(),
        }
    }
}

/// Outcome of [`LocalCache::extract_archive`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Files written.
    pub written: u64,
    /// Entries skipped because they would land outside the cache root.
    pub skipped: u64,
    /// Entries that could not be read or written.
    pub failed: u64,
}

/// A tile file found in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTile {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Filename (e.g., "N45E013.hgt").
    pub file: String,
    /// Size in bytes.
    pub size: u64,
}

/// Disk cache scoped to a single root directory.
#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
    layout: CacheLayout,
}

impl LocalCache {
    /// Open (and create if needed) a cache rooted at `root`.
    ///
    /// A missing root is created with owner-only permissions on Unix.
    pub fn new<P: AsRef<Path>>(root: P, layout: CacheLayout) -> Result<Self> {
        let root = root.as_ref();
        if !root.exists() {
            create_private_dir(root)?;
        }
        let root = fs::canonicalize(root)?;
        Ok(Self { root, layout })
    }

    /// The cache root (canonical).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory layout of this cache.
    pub fn layout(&self) -> CacheLayout {
        self.layout
    }

    /// Path where `key` is (or would be) stored.
    pub fn path_for(&self, key: &TileKey) -> PathBuf {
        match self.layout {
            CacheLayout::Grouped => self
                .root
                .join(&key.partition)
                .join(&key.group)
                .join(&key.file),
            CacheLayout::Flat => self.root.join(&key.file),
        }
    }

    /// Path of `key` if it is cached.
    ///
    /// A zero-length file counts as absent: it is what an interrupted write
    /// leaves behind.
    pub fn exists(&self, key: &TileKey) -> Option<PathBuf> {
        let path = self.contained(&self.path_for(key))?;
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Some(path),
            _ => None,
        }
    }

    /// Read the bytes of a cached tile.
    pub fn load(&self, key: &TileKey) -> Result<Option<Vec<u8>>> {
        match self.exists(key) {
            Some(path) => Ok(Some(fs::read(path)?)),
            None => Ok(None),
        }
    }

    /// Store `bytes` as the tile for `key`, creating directories as needed.
    ///
    /// An existing tile is replaced by rename, so mappings of the old file
    /// stay readable.
    pub fn save(&self, key: &TileKey, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.contained(&self.path_for(key)).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("tile key {:?} escapes the cache root", key),
            )
        })?;
        replace_file(&mut &bytes[..], &path)?;
        Ok(path)
    }

    /// Extract a zip archive into the cache.
    ///
    /// Entries are placed relative to `root/{partition}` for grouped caches
    /// and relative to `root` for flat ones. Entries resolving outside the
    /// root are skipped. A failing entry is logged and counted; entries
    /// already written stay in place.
    ///
    /// # Errors
    ///
    /// - [`DemError::CorruptArchive`](crate::DemError::CorruptArchive) if the
    ///   central directory cannot be read
    /// - [`DemError::Io`](crate::DemError::Io) if the extraction base
    ///   directory cannot be created
    pub fn extract_archive(&self, partition: &str, data: &[u8]) -> Result<ExtractStats> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;

        let base = match self.layout {
            CacheLayout::Grouped => self.root.join(partition),
            CacheLayout::Flat => self.root.clone(),
        };
        if self.contained(&base).is_some() || base == self.root {
            fs::create_dir_all(&base)?;
        }

        let mut stats = ExtractStats::default();
        for i in 0..archive.len() {
            let mut entry = match archive.by_index(i) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(index = i, error = %e, "Unreadable archive entry");
                    stats.failed += 1;
                    continue;
                }
            };

            let name = entry.name().to_string();
            let dest = match self.contained(&base.join(&name)) {
                Some(dest) => dest,
                None => {
                    tracing::warn!(entry = %name, "Skipping archive entry outside the cache root");
                    stats.skipped += 1;
                    continue;
                }
            };

            if entry.is_dir() {
                if let Err(e) = fs::create_dir_all(&dest) {
                    tracing::warn!(entry = %name, error = %e, "Failed to create directory");
                    stats.failed += 1;
                }
                continue;
            }

            match replace_file(&mut entry, &dest) {
                Ok(()) => {
                    tracing::debug!(path = %dest.display(), "Extracted");
                    stats.written += 1;
                }
                Err(e) => {
                    tracing::warn!(entry = %name, error = %e, "Failed to extract entry");
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Every non-empty `.hgt` file under the root, sorted by path.
    pub fn list_tiles(&self) -> Result<Vec<CachedTile>> {
        let mut tiles = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let file_type = entry.file_type()?;
                let path = entry.path();

                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }

                let file = entry.file_name().to_string_lossy().to_string();
                if !file.to_ascii_lowercase().ends_with(".hgt") {
                    continue;
                }
                let size = entry.metadata()?.len();
                if size > 0 {
                    tiles.push(CachedTile { path, file, size });
                }
            }
        }

        tiles.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(tiles)
    }

    /// `path` cleaned, if it is a strict descendant of the root.
    fn contained(&self, path: &Path) -> Option<PathBuf> {
        let cleaned = lexical_clean(path);
        (cleaned != self.root && cleaned.starts_with(&self.root)).then_some(cleaned)
    }
}

/// Copy `source` to `dest` through a sibling temporary file, so a reader never
/// observes a half-written tile and an existing file is never truncated.
fn replace_file(source: &mut impl io::Read, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let partial = dest.with_file_name(format!(".{}.{}.partial", file_name, std::process::id()));

    let result = File::create(&partial)
        .and_then(|mut out| io::copy(source, &mut out).and_then(|_| out.sync_all()))
        .and_then(|_| fs::rename(&partial, dest));

    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

/// Resolve `.` and `..` components without touching the filesystem.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => cleaned.push(".."),
            },
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DemError;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buffer));
            let options =
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
            for (name, data) in entries {
                if name.ends_with('/') {
                    zip.add_directory(*name, options).unwrap();
                } else {
                    zip.start_file(*name, options).unwrap();
                    zip.write_all(data).unwrap();
                }
            }
            zip.finish().unwrap();
        }
        buffer
    }

    fn grouped(dir: &TempDir) -> LocalCache {
        LocalCache::new(dir.path().join("cache"), CacheLayout::Grouped).unwrap()
    }

    #[test]
    fn test_creates_root() {
        let dir = TempDir::new().unwrap();
        let cache = grouped(&dir);
        assert!(cache.root().is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(cache.root()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn test_path_for_layouts() {
        let dir = TempDir::new().unwrap();
        let key = TileKey::new("dem1", "L33", "N45E013.hgt");

        let cache = grouped(&dir);
        assert_eq!(
            cache.path_for(&key),
            cache.root().join("dem1").join("L33").join("N45E013.hgt")
        );

        let flat = LocalCache::new(dir.path().join("flat"), CacheLayout::Flat).unwrap();
        assert_eq!(flat.path_for(&key), flat.root().join("N45E013.hgt"));
    }

    #[test]
    fn test_save_load_exists() {
        let dir = TempDir::new().unwrap();
        let cache = grouped(&dir);
        let key = TileKey::new("dem3", "SH56", "S32E152.hgt");

        assert!(cache.exists(&key).is_none());
        assert!(cache.load(&key).unwrap().is_none());

        let path = cache.save(&key, b"elevation").unwrap();
        assert_eq!(cache.exists(&key), Some(path));
        assert_eq!(cache.load(&key).unwrap().unwrap(), b"elevation");
    }

    #[cfg(unix)]
    #[test]
    fn test_save_replaces_without_truncating() {
        let dir = TempDir::new().unwrap();
        let cache = grouped(&dir);
        let key = TileKey::new("dem1", "L33", "N45E013.hgt");

        let path = cache.save(&key, b"first tile").unwrap();
        let held = fs::File::open(&path).unwrap();

        cache.save(&key, b"short").unwrap();
        assert_eq!(cache.load(&key).unwrap().unwrap(), b"short");

        // The handle opened before the replacement still sees the old file
        assert_eq!(held.metadata().unwrap().len(), 10);

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(leftovers, vec!["N45E013.hgt"]);
    }

    #[test]
    fn test_zero_length_is_absent() {
        let dir = TempDir::new().unwrap();
        let cache = grouped(&dir);
        let key = TileKey::new("dem1", "L33", "N45E013.hgt");

        let path = cache.save(&key, b"").unwrap();
        assert!(path.exists());
        assert!(cache.exists(&key).is_none());
        assert!(cache.load(&key).unwrap().is_none());
    }

    #[test]
    fn test_save_rejects_escaping_key() {
        let dir = TempDir::new().unwrap();
        let cache = grouped(&dir);
        let key = TileKey::new("dem1", "../../..", "evil.hgt");

        assert!(matches!(cache.save(&key, b"x"), Err(DemError::Io(_))));
        assert!(cache.exists(&key).is_none());
    }

    #[test]
    fn test_extract_grouped() {
        let dir = TempDir::new().unwrap();
        let cache = grouped(&dir);
        let archive = build_zip(&[
            ("L33/", b""),
            ("L33/N45E013.hgt", b"tile-a"),
            ("L33/N44E013.hgt", b"tile-b"),
        ]);

        let stats = cache.extract_archive("dem1", &archive).unwrap();
        assert_eq!(stats.written, 2);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.failed, 0);

        let key = TileKey::new("dem1", "L33", "N45E013.hgt");
        assert_eq!(cache.load(&key).unwrap().unwrap(), b"tile-a");
    }

    #[test]
    fn test_extract_flat() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path().join("flat"), CacheLayout::Flat).unwrap();
        let archive = build_zip(&[("N45E013.hgt", b"tile")]);

        cache.extract_archive("dem1", &archive).unwrap();
        let key = TileKey::new("dem1", "N45", "N45E013.hgt");
        assert!(cache.exists(&key).is_some());
    }

    #[test]
    fn test_extract_skips_traversal() {
        let dir = TempDir::new().unwrap();
        let cache = grouped(&dir);
        let archive = build_zip(&[
            ("../../escaped.hgt", b"evil"),
            ("L33/../../../escaped-deep.hgt", b"evil"),
            ("L33/N45E013.hgt", b"good"),
        ]);

        let stats = cache.extract_archive("dem1", &archive).unwrap();
        assert_eq!(stats.written, 1);
        assert_eq!(stats.skipped, 2);

        // root is <tmp>/cache, so ../../ from root/dem1 lands in <tmp>
        assert!(!dir.path().join("escaped.hgt").exists());
        assert!(!dir.path().join("escaped-deep.hgt").exists());
        assert!(cache
            .exists(&TileKey::new("dem1", "L33", "N45E013.hgt"))
            .is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_skips_absolute_path() {
        let dir = TempDir::new().unwrap();
        let cache = grouped(&dir);
        let outside = dir.path().join("absolute.hgt");
        let name = outside.to_string_lossy().to_string();
        let archive = build_zip(&[(name.as_str(), b"evil")]);

        let stats = cache.extract_archive("dem1", &archive).unwrap();
        assert_eq!(stats.written, 0);
        assert_eq!(stats.skipped, 1);
        assert!(!outside.exists());
    }

    #[test]
    fn test_extract_failed_entry_does_not_abort() {
        let dir = TempDir::new().unwrap();
        let cache = grouped(&dir);
        // `L33` is written as a file, so the next entry cannot create its
        // directory
        let archive = build_zip(&[
            ("L33", b"blocker"),
            ("L33/N45E013.hgt", b"unreachable"),
            ("K29/N40W007.hgt", b"tile"),
        ]);

        let stats = cache.extract_archive("dem1", &archive).unwrap();
        assert_eq!(stats.written, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 0);

        assert_eq!(fs::read(cache.root().join("dem1").join("L33")).unwrap(), b"blocker");
        assert!(cache
            .exists(&TileKey::new("dem1", "K29", "N40W007.hgt"))
            .is_some());
        assert!(cache
            .exists(&TileKey::new("dem1", "L33", "N45E013.hgt"))
            .is_none());
    }

    #[test]
    fn test_extract_corrupt_archive() {
        let dir = TempDir::new().unwrap();
        let cache = grouped(&dir);
        let result = cache.extract_archive("dem1", b"<html>404 Not Found</html>");
        assert!(matches!(result, Err(DemError::CorruptArchive(_))));
    }

    #[test]
    fn test_extract_overwrites_zero_length() {
        let dir = TempDir::new().unwrap();
        let cache = grouped(&dir);
        let key = TileKey::new("dem1", "L33", "N45E013.hgt");
        cache.save(&key, b"").unwrap();

        cache
            .extract_archive("dem1", &build_zip(&[("L33/N45E013.hgt", b"tile")]))
            .unwrap();
        assert_eq!(cache.load(&key).unwrap().unwrap(), b"tile");
    }

    #[test]
    fn test_list_tiles() {
        let dir = TempDir::new().unwrap();
        let cache = grouped(&dir);
        cache
            .save(&TileKey::new("dem3", "SH56", "S32E152.hgt"), b"b")
            .unwrap();
        cache
            .save(&TileKey::new("dem1", "L33", "N45E013.hgt"), b"aa")
            .unwrap();
        cache
            .save(&TileKey::new("dem1", "L33", "N44E013.hgt"), b"")
            .unwrap();
        fs::write(cache.root().join("readme.txt"), "not a tile").unwrap();

        let tiles = cache.list_tiles().unwrap();
        let names: Vec<_> = tiles.iter().map(|t| t.file.as_str()).collect();
        assert_eq!(names, vec!["N45E013.hgt", "S32E152.hgt"]);
        assert_eq!(tiles[0].size, 2);
    }

    #[test]
    fn test_lexical_clean() {
        assert_eq!(
            lexical_clean(Path::new("/cache/dem1/../dem3/./L33")),
            PathBuf::from("/cache/dem3/L33")
        );
        assert_eq!(
            lexical_clean(Path::new("/cache/../../etc")),
            PathBuf::from("/etc")
        );
        assert_eq!(lexical_clean(Path::new("a/../../b")), PathBuf::from("../b"));
    }
}
