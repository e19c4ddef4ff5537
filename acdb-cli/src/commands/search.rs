//! Marker name search.

use acdb::search::SearchMarker;
use clap::Args;

use super::common::{BoxArgs, Context};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[command(flatten)]
    pub bbox: BoxArgs,

    /// Maximum results (defaults to sync.max_search_results)
    #[arg(long)]
    pub limit: Option<usize>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Name fragment; omit to list every marker in the area
    pub name: Option<String>,
}

pub fn run(context: &Context, args: SearchArgs) -> Result<(), CliError> {
    let sync = &context.config.sync;
    let name = args.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    if let Some(name) = name {
        if name.chars().count() < sync.min_search_length {
            return Err(CliError::InvalidArgument(format!(
                "search term must be at least {} characters",
                sync.min_search_length
            )));
        }
    }

    let db = context.open_database()?;
    let limit = args.limit.unwrap_or(sync.max_search_results);
    let bbox = args.bbox;
    let results =
        db.get_search_markers_by_name(name, bbox.south, bbox.west, bbox.north, bbox.east, limit)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if results.is_empty() {
        println!("No markers found");
    } else {
        for marker in &results {
            println!("{}", format_result(marker));
        }
    }
    Ok(())
}

fn format_result(marker: &SearchMarker) -> String {
    format!(
        "{:>10}  {:<24} {:>10.5} {:>11.5}  {}",
        marker.id,
        marker.marker_type.name(),
        marker.position.latitude,
        marker.position.longitude,
        marker.name
    )
}
