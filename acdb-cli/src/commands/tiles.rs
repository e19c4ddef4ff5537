//! Tile maintenance and inspection commands.

use std::path::PathBuf;

use acdb::export::{prepare_export, ExportResponse};
use acdb::model::LastUpdateInfo;
use clap::Args;
use tracing::warn;

use super::common::{read_body, BoxArgs, Context, TileCoords};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct InstallArgs {
    #[command(flatten)]
    pub tile: TileCoords,

    /// Bundle file
    pub bundle: PathBuf,
}

#[derive(Debug, Args)]
pub struct InstallExportArgs {
    /// Export offer JSON (tileX, tileY, gzip {fileSize, sha256, url})
    #[arg(long)]
    pub offer: PathBuf,

    /// Downloaded gzip file
    pub download: PathBuf,
}

#[derive(Debug, Args)]
pub struct TileArgs {
    #[command(flatten)]
    pub tile: TileCoords,
}

#[derive(Debug, Args)]
pub struct TilesArgs {
    #[command(flatten)]
    pub bbox: BoxArgs,
}

pub fn version(context: &Context) -> Result<(), CliError> {
    let db = context.open_database()?;
    println!("acdb {}", acdb::VERSION);
    println!("Data version: {}", db.get_version());
    Ok(())
}

pub fn install(context: &Context, args: InstallArgs) -> Result<(), CliError> {
    let db = context.open_database()?;
    let summary = db.install_tile(&args.bundle, args.tile.tile_x, args.tile.tile_y)?;
    println!(
        "Installed tile {}: {} markers, {} reviews (version {})",
        summary.tile, summary.markers, summary.reviews, summary.version
    );
    Ok(())
}

/// Verify and unpack a downloaded export, then install it.
pub fn install_export(context: &Context, args: InstallExportArgs) -> Result<(), CliError> {
    let offer: ExportResponse = serde_json::from_str(&read_body(&args.offer)?)?;
    let db = context.open_database()?;

    let staging = context.config.data_directory().join("exports");
    let bundle = prepare_export(&args.download, &offer, &staging)?;
    let result = db.install_tile(&bundle, offer.tile_x, offer.tile_y);
    if let Err(e) = std::fs::remove_file(&bundle) {
        warn!(path = %bundle.display(), error = %e, "Failed to remove unpacked export");
    }

    let summary = result?;
    println!(
        "Installed export for tile {}: {} markers, {} reviews (version {})",
        summary.tile, summary.markers, summary.reviews, summary.version
    );
    Ok(())
}

pub fn delete_tile(context: &Context, args: TileArgs) -> Result<(), CliError> {
    let db = context.open_database()?;
    db.delete_tile(args.tile.tile_x, args.tile.tile_y)?;
    println!("Deleted tile ({}, {})", args.tile.tile_x, args.tile.tile_y);
    Ok(())
}

pub fn delete_reviews(context: &Context, args: TileArgs) -> Result<(), CliError> {
    let db = context.open_database()?;
    db.delete_tile_reviews(args.tile.tile_x, args.tile.tile_y)?;
    println!(
        "Deleted reviews of tile ({}, {})",
        args.tile.tile_x, args.tile.tile_y
    );
    Ok(())
}

pub fn delete_database(context: &Context, confirmed: bool) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::InvalidArgument(
            "delete-database removes all data; pass --yes to confirm".to_string(),
        ));
    }
    let db = context.open_database()?;
    db.delete_database()?;
    println!("Database deleted");
    Ok(())
}

pub fn last_modified(context: &Context, args: TileArgs) -> Result<(), CliError> {
    let db = context.open_database()?;
    let info = db.get_tile_last_modified(args.tile.tile_x, args.tile.tile_y)?;
    println!("{}", format_last_update(&info));
    Ok(())
}

pub fn tiles(context: &Context, args: TilesArgs) -> Result<(), CliError> {
    let db = context.open_database()?;
    let BoxArgs {
        south,
        west,
        north,
        east,
    } = args.bbox;
    let tiles = db.get_tiles_last_modified_by_bounding_box(south, west, north, east)?;
    if tiles.is_empty() {
        println!("No tiles in area");
        return Ok(());
    }
    for (tile, info) in &tiles {
        println!("{}  {}", tile, format_last_update(info));
    }
    Ok(())
}

fn format_last_update(info: &LastUpdateInfo) -> String {
    format!(
        "markers: {}  reviews: {}",
        info.marker_last_update_string()
            .unwrap_or_else(|| "never".to_string()),
        info.review_last_update_string()
            .unwrap_or_else(|| "never".to_string())
    )
}
