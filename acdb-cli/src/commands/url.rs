//! `acdb://` link inspection.

use acdb::action::AcdbUrlAction;
use clap::Args;

use super::common::Context;
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct ParseUrlArgs {
    /// Name shown on review list pages
    #[arg(long, default_value = "")]
    pub captain_name: String,

    /// Review page size (defaults to sync.review_page_size)
    #[arg(long)]
    pub page_size: Option<u32>,

    pub url: String,
}

pub fn run(context: &Context, args: ParseUrlArgs) -> Result<(), CliError> {
    let db = context.open_database()?;
    let page_size = args
        .page_size
        .unwrap_or(context.config.sync.review_page_size);
    let action = db.parse_acdb_url(&args.url, &args.captain_name, page_size)?;

    println!("Action: {}", action.kind());
    println!("Target: {}", action.target_id());
    match &action {
        AcdbUrlAction::SectionDetail { section, .. } => println!("Section: {}", section),
        AcdbUrlAction::ReviewList {
            page, page_size, ..
        } => println!("Page: {} (size {})", page, page_size),
        _ => {}
    }
    if let Some(path) = action.webview_path() {
        println!("Web view: {}", path);
    }
    Ok(())
}
