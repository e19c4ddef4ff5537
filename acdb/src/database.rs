//! Single entry point bundling the store, sync engine and queries.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::action::{parse_acdb_url, AcdbUrlAction};
use crate::config::{
    parse_language, ConfigFile, CoordinateFormat, DateFormat, DisplaySettings, DistanceUnit,
    SyncConfig,
};
use crate::error::AcdbResult;
use crate::model::{DatabaseVersion, LastUpdateInfo, MarkerId};
use crate::search::{SearchMarker, SpatialIndex};
use crate::store::{DiskBackend, InstallSummary, TileStore};
use crate::sync::{SyncEngine, SyncPlan, SyncStatusRequest, SyncStatusResponse};
use crate::tile::{BoundingBox, TileXY};

/// Offline replica of the marker and review database.
///
/// Takes raw tile coordinates and response bodies as the host receives them,
/// validates them and forwards to the store, engine, spatial index or URL
/// router. Safe to share between threads.
#[derive(Debug)]
pub struct ActiveCaptainDatabase {
    store: Arc<TileStore>,
    engine: SyncEngine,
    index: SpatialIndex,
    language: RwLock<String>,
    display: RwLock<DisplaySettings>,
    sync: SyncConfig,
}

impl ActiveCaptainDatabase {
    /// Open (or create) a database persisted in `directory`.
    pub fn open(directory: &Path, language: &str) -> AcdbResult<Self> {
        let store = TileStore::open(DiskBackend::open(directory)?)?;
        Self::with_store(Arc::new(store), language)
    }

    /// Database that keeps nothing on disk.
    pub fn in_memory(language: &str) -> AcdbResult<Self> {
        Self::with_store(Arc::new(TileStore::in_memory()), language)
    }

    /// Open using the directory, language, display and sync settings of a
    /// configuration file.
    pub fn from_config(config: &ConfigFile) -> AcdbResult<Self> {
        let mut db = Self::open(&config.data_directory(), &config.database.language)?;
        *db.display.get_mut() = config.display;
        db.sync = config.sync;
        Ok(db)
    }

    pub fn with_store(store: Arc<TileStore>, language: &str) -> AcdbResult<Self> {
        let language = parse_language(language)?;
        info!(language = %language, version = %store.version(), "Database ready");
        Ok(Self {
            engine: SyncEngine::new(Arc::clone(&store)),
            index: SpatialIndex::new(Arc::clone(&store)),
            store,
            language: RwLock::new(language),
            display: RwLock::new(DisplaySettings::default()),
            sync: SyncConfig::default(),
        })
    }

    pub fn store(&self) -> &Arc<TileStore> {
        &self.store
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn sync_config(&self) -> &SyncConfig {
        &self.sync
    }

    // ------------------------------------------------------------------
    // Tile store
    // ------------------------------------------------------------------

    pub fn delete_database(&self) -> AcdbResult<()> {
        self.store.delete_database()
    }

    pub fn delete_tile(&self, tile_x: i32, tile_y: i32) -> AcdbResult<()> {
        self.store.delete_tile(TileXY::new(tile_x, tile_y)?)
    }

    pub fn delete_tile_reviews(&self, tile_x: i32, tile_y: i32) -> AcdbResult<()> {
        self.store.delete_tile_reviews(TileXY::new(tile_x, tile_y)?)
    }

    pub fn get_tile_last_modified(&self, tile_x: i32, tile_y: i32) -> AcdbResult<LastUpdateInfo> {
        Ok(self.store.tile_last_modified(TileXY::new(tile_x, tile_y)?))
    }

    pub fn get_tiles_last_modified_by_bounding_box(
        &self,
        south: f64,
        west: f64,
        north: f64,
        east: f64,
    ) -> AcdbResult<BTreeMap<TileXY, LastUpdateInfo>> {
        self.index.tiles_last_modified(south, west, north, east)
    }

    pub fn install_tile(&self, path: &Path, tile_x: i32, tile_y: i32) -> AcdbResult<InstallSummary> {
        self.store.install_tile(path, TileXY::new(tile_x, tile_y)?)
    }

    pub fn get_version(&self) -> DatabaseVersion {
        self.store.version()
    }

    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    pub fn process_create_marker_response(&self, json: &str) -> AcdbResult<MarkerId> {
        self.engine.process_create_marker_response(json)
    }

    pub fn process_move_marker_response(&self, json: &str) -> AcdbResult<()> {
        self.engine.process_move_marker_response(json)
    }

    pub fn process_sync_markers_response(
        &self,
        json: &str,
        tile_x: i32,
        tile_y: i32,
    ) -> AcdbResult<usize> {
        let tile = TileXY::new(tile_x, tile_y)?;
        self.engine.process_sync_markers_response(json, tile)
    }

    pub fn process_sync_reviews_response(
        &self,
        json: &str,
        tile_x: i32,
        tile_y: i32,
    ) -> AcdbResult<usize> {
        let tile = TileXY::new(tile_x, tile_y)?;
        self.engine.process_sync_reviews_response(json, tile)
    }

    pub fn process_vote_for_review_response(&self, json: &str) -> AcdbResult<()> {
        self.engine.process_vote_for_review_response(json)
    }

    pub fn process_web_view_response(&self, json: &str) -> AcdbResult<()> {
        self.engine.process_web_view_response(json)
    }

    /// Status request entries for every defined tile in the given areas.
    pub fn sync_status_requests(&self, boxes: &[BoundingBox]) -> Vec<SyncStatusRequest> {
        SyncStatusRequest::for_boxes(&self.store, boxes)
    }

    /// Apply a status response's deletes and return the remaining work.
    pub fn apply_sync_status(&self, responses: &[SyncStatusResponse]) -> AcdbResult<SyncPlan> {
        SyncPlan::from_responses(responses, &self.store)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_search_markers_by_name(
        &self,
        name: Option<&str>,
        south: f64,
        west: f64,
        north: f64,
        east: f64,
        max_result_count: usize,
    ) -> AcdbResult<Vec<SearchMarker>> {
        self.index
            .search_markers_by_name(name, south, west, north, east, max_result_count)
    }

    pub fn parse_acdb_url(
        &self,
        url: &str,
        captain_name: &str,
        page_size: u32,
    ) -> AcdbResult<AcdbUrlAction> {
        parse_acdb_url(url, captain_name, page_size)
    }

    // ------------------------------------------------------------------
    // Rendering settings
    // ------------------------------------------------------------------

    pub fn language(&self) -> String {
        self.language.read().clone()
    }

    /// Change the language used for rendering; must look like `en_US`.
    pub fn set_language(&self, language: &str) -> AcdbResult<()> {
        *self.language.write() = parse_language(language)?;
        Ok(())
    }

    pub fn display_settings(&self) -> DisplaySettings {
        *self.display.read()
    }

    pub fn set_coordinate_format(&self, format: CoordinateFormat) {
        self.display.write().coordinate_format = format;
    }

    pub fn set_date_format(&self, format: DateFormat) {
        self.display.write().date_format = format;
    }

    pub fn set_distance_unit(&self, unit: DistanceUnit) {
        self.display.write().distance_unit = unit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AcdbError;
    use tempfile::TempDir;

    #[test]
    fn test_rejects_bad_tile_coordinates() {
        let db = ActiveCaptainDatabase::in_memory("en_US").unwrap();
        for (x, y) in [(-1, 0), (0, 16), (16, 16)] {
            assert!(matches!(
                db.delete_tile(x, y),
                Err(AcdbError::InvalidTileCoordinate { .. })
            ));
            assert!(db.get_tile_last_modified(x, y).is_err());
            assert!(db.process_sync_markers_response(r#"{"pointsOfInterest": []}"#, x, y).is_err());
        }
    }

    #[test]
    fn test_rejects_bad_language() {
        assert!(ActiveCaptainDatabase::in_memory("english").is_err());
        let db = ActiveCaptainDatabase::in_memory("en_US").unwrap();
        assert!(db.set_language("xx").is_err());
        db.set_language("pt_BR").unwrap();
        assert_eq!(db.language(), "pt_BR");
    }

    #[test]
    fn test_display_settings_recorded() {
        let db = ActiveCaptainDatabase::in_memory("en_US").unwrap();
        db.set_distance_unit(DistanceUnit::Meters);
        db.set_coordinate_format(CoordinateFormat::DecimalDegrees);
        let settings = db.display_settings();
        assert_eq!(settings.distance_unit, DistanceUnit::Meters);
        assert_eq!(settings.coordinate_format, CoordinateFormat::DecimalDegrees);
        assert_eq!(settings.date_format, DateFormat::default());
    }

    #[test]
    fn test_from_config_uses_directory() {
        let temp = TempDir::new().unwrap();
        let mut config = ConfigFile::default();
        config
            .set("database.directory", &temp.path().display().to_string())
            .unwrap();
        config.set("display.date_format", "dmy-dash").unwrap();
        config.set("sync.max_result_count", "50").unwrap();

        let db = ActiveCaptainDatabase::from_config(&config).unwrap();
        assert_eq!(db.display_settings().date_format, DateFormat::DmyDash);
        assert_eq!(db.sync_config().max_result_count, 50);
        assert_eq!(db.get_version(), DatabaseVersion::ZERO);
    }
}
