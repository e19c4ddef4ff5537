//! Full tile exports.
//!
//! When a tile is too far behind for incremental sync the service offers a
//! gzip-compressed bundle. The host downloads it; [`prepare_export`] checks
//! the download against the advertised size and checksum and unpacks it
//! next to the data directory, ready for `install_tile`.

mod checksum;

pub use checksum::{calculate_file_checksum, verify_checksum};

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AcdbError, AcdbResult};
use crate::tile::TileXY;

/// Downloadable file advertised by the export endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFile {
    pub file_size: u64,
    pub sha256: String,
    pub url: String,
}

/// Export offer for one tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub tile_x: i32,
    pub tile_y: i32,
    pub gzip: ExportFile,
}

impl ExportResponse {
    pub fn tile(&self) -> AcdbResult<TileXY> {
        TileXY::new(self.tile_x, self.tile_y)
    }
}

/// Name of the unpacked bundle for a tile.
pub fn export_file_name(tile: TileXY) -> String {
    format!("active_captain_{}_{}.json", tile.x(), tile.y())
}

/// Verify a downloaded export and unpack it into `target_dir`.
///
/// Returns the path of the unpacked bundle. Size, checksum and decompression
/// failures are `InstallFailure`; a partly written bundle is removed.
pub fn prepare_export(
    downloaded: &Path,
    export: &ExportResponse,
    target_dir: &Path,
) -> AcdbResult<PathBuf> {
    let tile = export.tile()?;

    let size = fs::metadata(downloaded)
        .map_err(|e| AcdbError::install(downloaded, e.to_string()))?
        .len();
    if size != export.gzip.file_size {
        return Err(AcdbError::install(
            downloaded,
            format!(
                "size mismatch: expected {} bytes, got {}",
                export.gzip.file_size, size
            ),
        ));
    }
    verify_checksum(downloaded, &export.gzip.sha256)?;

    fs::create_dir_all(target_dir).map_err(|e| AcdbError::storage(target_dir, e))?;
    let target = target_dir.join(export_file_name(tile));

    let result = (|| -> io::Result<u64> {
        let mut decoder = GzDecoder::new(BufReader::new(File::open(downloaded)?));
        let mut writer = BufWriter::new(File::create(&target)?);
        let written = io::copy(&mut decoder, &mut writer)?;
        writer.flush()?;
        Ok(written)
    })();

    match result {
        Ok(written) => {
            info!(
                tile = %tile,
                path = %target.display(),
                bytes = written,
                "Export unpacked"
            );
            Ok(target)
        }
        Err(e) => {
            let _ = fs::remove_file(&target);
            Err(AcdbError::install(downloaded, format!("gzip decode failed: {}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn offer(path: &Path, x: i32, y: i32) -> ExportResponse {
        ExportResponse {
            tile_x: x,
            tile_y: y,
            gzip: ExportFile {
                file_size: fs::metadata(path).unwrap().len(),
                sha256: calculate_file_checksum(path).unwrap(),
                url: "https://example.invalid/export.gz".to_string(),
            },
        }
    }

    #[test]
    fn test_prepare_export_unpacks() {
        let temp = TempDir::new().unwrap();
        let download = temp.path().join("download.gz");
        fs::write(&download, gzip(br#"{"version": "1.0.0.0"}"#)).unwrap();

        let out = prepare_export(&download, &offer(&download, 3, 4), &temp.path().join("out"))
            .unwrap();
        assert!(out.ends_with("active_captain_3_4.json"));
        assert_eq!(fs::read_to_string(out).unwrap(), r#"{"version": "1.0.0.0"}"#);
    }

    #[test]
    fn test_size_mismatch() {
        let temp = TempDir::new().unwrap();
        let download = temp.path().join("download.gz");
        fs::write(&download, gzip(b"{}")).unwrap();

        let mut export = offer(&download, 3, 4);
        export.gzip.file_size += 1;
        let err = prepare_export(&download, &export, temp.path()).unwrap_err();
        assert!(err.to_string().contains("size mismatch"));
    }

    #[test]
    fn test_checksum_mismatch() {
        let temp = TempDir::new().unwrap();
        let download = temp.path().join("download.gz");
        fs::write(&download, gzip(b"{}")).unwrap();

        let mut export = offer(&download, 3, 4);
        export.gzip.sha256 = "00".repeat(32);
        assert!(matches!(
            prepare_export(&download, &export, temp.path()),
            Err(AcdbError::InstallFailure { .. })
        ));
    }

    #[test]
    fn test_not_gzip_leaves_no_file() {
        let temp = TempDir::new().unwrap();
        let download = temp.path().join("download.gz");
        fs::write(&download, b"plain text").unwrap();

        let err = prepare_export(&download, &offer(&download, 1, 1), temp.path()).unwrap_err();
        assert!(err.to_string().contains("gzip"));
        assert!(!temp.path().join("active_captain_1_1.json").exists());
    }

    #[test]
    fn test_export_response_wire_names() {
        let export: ExportResponse = serde_json::from_str(
            r#"{"tileX": 2, "tileY": 9, "gzip": {"fileSize": 10, "sha256": "ab", "url": "u"}}"#,
        )
        .unwrap();
        assert_eq!(export.tile().unwrap(), TileXY::new(2, 9).unwrap());
    }
}
