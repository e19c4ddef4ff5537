//! Commands applying service response bodies to the local database.

use std::collections::BTreeSet;
use std::path::PathBuf;

use acdb::sync::{needs_follow_up, SyncPlan, SyncStatusResponse};
use acdb::tile::{BoundingBox, TileXY};
use clap::Args;
use tracing::info;

use super::common::{read_body, BoxArgs, Context, TileCoords};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct BodyArgs {
    /// JSON body file, or `-` for stdin
    pub body: PathBuf,
}

#[derive(Debug, Args)]
pub struct TileBodyArgs {
    #[command(flatten)]
    pub tile: TileCoords,

    /// JSON body file, or `-` for stdin
    pub body: PathBuf,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub bbox: BoxArgs,

    /// Apply a status response (JSON array) instead of printing the request
    #[arg(long)]
    pub response: Option<PathBuf>,
}

pub fn create_marker(context: &Context, args: BodyArgs) -> Result<(), CliError> {
    let db = context.open_database()?;
    let id = db.process_create_marker_response(&read_body(&args.body)?)?;
    println!("Created marker {}", id);
    Ok(())
}

pub fn move_marker(context: &Context, args: BodyArgs) -> Result<(), CliError> {
    let db = context.open_database()?;
    db.process_move_marker_response(&read_body(&args.body)?)?;
    println!("Marker moved");
    Ok(())
}

pub fn sync_markers(context: &Context, args: TileBodyArgs) -> Result<(), CliError> {
    let db = context.open_database()?;
    let body = read_body(&args.body)?;
    let (x, y) = (args.tile.tile_x, args.tile.tile_y);
    let before = db.get_tile_last_modified(x, y)?;
    let count = db.process_sync_markers_response(&body, x, y)?;
    let after = db.get_tile_last_modified(x, y)?;
    let follow_up = needs_follow_up(
        count,
        context.config.sync.max_result_count,
        before.marker_last_update,
        after.marker_last_update,
    );
    report_sync("marker", count, follow_up);
    Ok(())
}

pub fn sync_reviews(context: &Context, args: TileBodyArgs) -> Result<(), CliError> {
    let db = context.open_database()?;
    let body = read_body(&args.body)?;
    let (x, y) = (args.tile.tile_x, args.tile.tile_y);
    let before = db.get_tile_last_modified(x, y)?;
    let count = db.process_sync_reviews_response(&body, x, y)?;
    let after = db.get_tile_last_modified(x, y)?;
    let follow_up = needs_follow_up(
        count,
        context.config.sync.max_result_count,
        before.review_last_update,
        after.review_last_update,
    );
    report_sync("review", count, follow_up);
    Ok(())
}

pub fn vote(context: &Context, args: BodyArgs) -> Result<(), CliError> {
    let db = context.open_database()?;
    db.process_vote_for_review_response(&read_body(&args.body)?)?;
    println!("Vote recorded");
    Ok(())
}

pub fn webview(context: &Context, args: BodyArgs) -> Result<(), CliError> {
    let db = context.open_database()?;
    db.process_web_view_response(&read_body(&args.body)?)?;
    println!("Web view result applied");
    Ok(())
}

/// Print the status request for an area, or apply a status response.
pub fn status(context: &Context, args: StatusArgs) -> Result<(), CliError> {
    let db = context.open_database()?;

    if let Some(path) = args.response {
        let responses: Vec<SyncStatusResponse> = serde_json::from_str(&read_body(&path)?)?;
        let plan = db.apply_sync_status(&responses)?;
        print_plan(&plan);
        return Ok(());
    }

    let BoxArgs {
        south,
        west,
        north,
        east,
    } = args.bbox;
    let bbox = BoundingBox::new(south, west, north, east)?;
    let requests = db.sync_status_requests(&[bbox]);
    if requests.is_empty() {
        info!("No installed tiles in area; request the tile list instead");
    }
    println!("{}", serde_json::to_string_pretty(&requests)?);
    Ok(())
}

fn report_sync(entity: &str, count: usize, follow_up: bool) {
    println!("Applied {} {} changes", count, entity);
    if follow_up {
        println!("Page was full; request the next page");
    }
}

fn print_plan(plan: &SyncPlan) {
    if plan.is_empty() {
        println!("Nothing to do");
        return;
    }
    print_tiles("Export", &plan.export);
    print_tiles("Sync markers", &plan.sync_markers);
    print_tiles("Sync reviews", &plan.sync_reviews);
    print_tiles("Deleted markers", &plan.deleted_markers);
    print_tiles("Deleted reviews", &plan.deleted_reviews);
}

fn print_tiles(label: &str, tiles: &BTreeSet<TileXY>) {
    if tiles.is_empty() {
        return;
    }
    let list: Vec<String> = tiles.iter().map(ToString::to_string).collect();
    println!("{}: {}", label, list.join(" "));
}
