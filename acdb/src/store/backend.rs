//! Persistence back ends for the tile store.
//!
//! The store keeps every tile in memory and writes through to a
//! [`TileBackend`] before an in-memory change becomes visible. Back ends only
//! need to make a single tile write atomic; cross-tile consistency is handled
//! by the store.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, warn};

use crate::error::{AcdbError, AcdbResult};
use crate::model::DatabaseVersion;
use crate::tile::TileXY;

use super::tile_data::TileData;

/// Durable storage for tile contents and the store version.
///
/// Implementations must be safe to call from several threads at once for
/// *different* tiles; the store never issues two concurrent writes for the
/// same tile.
pub trait TileBackend: Send + Sync {
    /// Stored content version, or `None` if nothing was ever saved.
    fn load_version(&self) -> AcdbResult<Option<DatabaseVersion>>;

    fn save_version(&self, version: DatabaseVersion) -> AcdbResult<()>;

    /// Stored contents of a tile, or `None` if the tile was never saved.
    fn load_tile(&self, tile: TileXY) -> AcdbResult<Option<TileData>>;

    /// Replace the stored contents of a tile. Empty tiles may be dropped.
    fn save_tile(&self, tile: TileXY, data: &TileData) -> AcdbResult<()>;

    /// Remove everything, including the version.
    fn clear(&self) -> AcdbResult<()>;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

/// Back end that persists nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryBackend;

impl TileBackend for MemoryBackend {
    fn load_version(&self) -> AcdbResult<Option<DatabaseVersion>> {
        Ok(None)
    }

    fn save_version(&self, _version: DatabaseVersion) -> AcdbResult<()> {
        Ok(())
    }

    fn load_tile(&self, _tile: TileXY) -> AcdbResult<Option<TileData>> {
        Ok(None)
    }

    fn save_tile(&self, _tile: TileXY, _data: &TileData) -> AcdbResult<()> {
        Ok(())
    }

    fn clear(&self) -> AcdbResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

const VERSION_FILE: &str = "version";
const TILE_PREFIX: &str = "tile_";
const TILE_SUFFIX: &str = ".json.gz";

/// Back end storing one gzip-compressed JSON document per tile.
///
/// Layout inside the directory:
///
/// ```text
/// version              # "2.0.1.4"
/// tile_3_4.json.gz     # TileData for tile (3, 4)
/// ```
///
/// Writes go to a `.tmp` sibling that is renamed into place, so a reader
/// (or a crash) sees either the old or the new file.
#[derive(Debug, Clone)]
pub struct DiskBackend {
    directory: PathBuf,
}

impl DiskBackend {
    /// Open (creating if needed) a data directory.
    pub fn open(directory: impl Into<PathBuf>) -> AcdbResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|e| AcdbError::storage(&directory, e))?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn tile_path(&self, tile: TileXY) -> PathBuf {
        self.directory.join(format!(
            "{}{}_{}{}",
            TILE_PREFIX,
            tile.x(),
            tile.y(),
            TILE_SUFFIX
        ))
    }

    fn version_path(&self) -> PathBuf {
        self.directory.join(VERSION_FILE)
    }

    fn is_data_file(name: &str) -> bool {
        name == VERSION_FILE || (name.starts_with(TILE_PREFIX) && name.ends_with(TILE_SUFFIX))
    }

    /// Write `contents` to `path` through a temporary sibling.
    fn write_atomic(
        path: &Path,
        contents: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
    ) -> AcdbResult<()> {
        let tmp_path = path.with_extension("tmp");
        let result = (|| {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            contents(&mut writer)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            fs::rename(&tmp_path, path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(AcdbError::storage(path, e));
        }
        Ok(())
    }
}

impl TileBackend for DiskBackend {
    fn load_version(&self) -> AcdbResult<Option<DatabaseVersion>> {
        let path = self.version_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AcdbError::storage(&path, e)),
        };
        text.parse()
            .map(Some)
            .map_err(|e| AcdbError::storage(&path, io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    fn save_version(&self, version: DatabaseVersion) -> AcdbResult<()> {
        Self::write_atomic(&self.version_path(), |w| writeln!(w, "{}", version))
    }

    fn load_tile(&self, tile: TileXY) -> AcdbResult<Option<TileData>> {
        let path = self.tile_path(tile);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AcdbError::storage(&path, e)),
        };
        let reader = GzDecoder::new(BufReader::new(file));
        serde_json::from_reader(reader)
            .map(Some)
            .map_err(|e| AcdbError::storage(&path, io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    fn save_tile(&self, tile: TileXY, data: &TileData) -> AcdbResult<()> {
        let path = self.tile_path(tile);
        if data.is_empty() {
            return match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(AcdbError::storage(&path, e)),
            };
        }

        Self::write_atomic(&path, |w| {
            let mut encoder = GzEncoder::new(w, Compression::default());
            serde_json::to_writer(&mut encoder, data).map_err(io::Error::from)?;
            encoder.finish()?;
            Ok(())
        })?;
        debug!(tile = %tile, path = %path.display(), "Tile saved");
        Ok(())
    }

    fn clear(&self) -> AcdbResult<()> {
        let entries =
            fs::read_dir(&self.directory).map_err(|e| AcdbError::storage(&self.directory, e))?;

        let mut removed = 0usize;
        for entry in entries {
            let entry = entry.map_err(|e| AcdbError::storage(&self.directory, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !Self::is_data_file(name) {
                continue;
            }
            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove data file");
                    return Err(AcdbError::storage(&path, e));
                }
            }
        }
        debug!(directory = %self.directory.display(), removed, "Data directory cleared");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "disk"
    }
}
