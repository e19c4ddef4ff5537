//! ACDB CLI - Command-line interface
//!
//! Drives the `acdb` library against files on disk: install tile bundles,
//! apply sync response bodies, query tiles and parse `acdb://` links.

mod commands;
mod error;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use acdb::config::config_file_path;
use clap::{Parser, Subcommand};

use commands::common::Context;
use commands::config::ConfigCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "acdb", version, about = "Offline marine points-of-interest database")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory, overriding database.directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the installed data version
    Version,

    /// Install a tile bundle (JSON, optionally gzip-compressed)
    Install(commands::tiles::InstallArgs),

    /// Verify a downloaded tile export and install it
    InstallExport(commands::tiles::InstallExportArgs),

    /// Delete all markers and reviews of a tile
    DeleteTile(commands::tiles::TileArgs),

    /// Delete the reviews of a tile
    DeleteReviews(commands::tiles::TileArgs),

    /// Delete the whole database
    DeleteDatabase {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Show the last-update record of a tile
    LastModified(commands::tiles::TileArgs),

    /// List defined tiles overlapping a bounding box
    Tiles(commands::tiles::TilesArgs),

    /// Search markers by name inside a bounding box
    Search(commands::search::SearchArgs),

    /// Apply a create-marker response body
    CreateMarker(commands::sync::BodyArgs),

    /// Apply a move-marker response body
    MoveMarker(commands::sync::BodyArgs),

    /// Apply a sync-markers response body to a tile
    SyncMarkers(commands::sync::TileBodyArgs),

    /// Apply a sync-reviews response body to a tile
    SyncReviews(commands::sync::TileBodyArgs),

    /// Apply a vote response body
    Vote(commands::sync::BodyArgs),

    /// Apply a web view result body
    Webview(commands::sync::BodyArgs),

    /// Build a sync status request for an area, or apply a status response
    SyncStatus(commands::sync::StatusArgs),

    /// Parse an acdb:// URL
    ParseUrl(commands::url::ParseUrlArgs),

    /// View or change configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&mut std::io::stderr().lock(), &e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// Logging may also write to stderr, so errors go out here only.
fn report_error(out: &mut impl Write, e: &CliError) {
    let _ = writeln!(out, "Error: {}", e);
}

fn run(cli: Cli) -> Result<(), CliError> {
    // Config commands must work even when the file is broken
    if let Commands::Config(command) = cli.command {
        let path = cli.config.unwrap_or_else(config_file_path);
        return commands::config::run(command, &path);
    }

    let context = Context::load(cli.config, cli.data_dir, cli.verbose)?;
    let _logging = context.init_logging()?;

    match cli.command {
        Commands::Version => commands::tiles::version(&context),
        Commands::Install(args) => commands::tiles::install(&context, args),
        Commands::InstallExport(args) => commands::tiles::install_export(&context, args),
        Commands::DeleteTile(args) => commands::tiles::delete_tile(&context, args),
        Commands::DeleteReviews(args) => commands::tiles::delete_reviews(&context, args),
        Commands::DeleteDatabase { yes } => commands::tiles::delete_database(&context, yes),
        Commands::LastModified(args) => commands::tiles::last_modified(&context, args),
        Commands::Tiles(args) => commands::tiles::tiles(&context, args),
        Commands::Search(args) => commands::search::run(&context, args),
        Commands::CreateMarker(args) => commands::sync::create_marker(&context, args),
        Commands::MoveMarker(args) => commands::sync::move_marker(&context, args),
        Commands::SyncMarkers(args) => commands::sync::sync_markers(&context, args),
        Commands::SyncReviews(args) => commands::sync::sync_reviews(&context, args),
        Commands::Vote(args) => commands::sync::vote(&context, args),
        Commands::Webview(args) => commands::sync::webview(&context, args),
        Commands::SyncStatus(args) => commands::sync::status(&context, args),
        Commands::ParseUrl(args) => commands::url::run(&context, args),
        Commands::Config(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync_markers() {
        let cli = Cli::try_parse_from([
            "acdb",
            "sync-markers",
            "--tile-x",
            "3",
            "--tile-y",
            "4",
            "body.json",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::SyncMarkers(_)));
    }

    #[test]
    fn test_negative_bounding_box_values() {
        let cli = Cli::try_parse_from([
            "acdb", "search", "--south", "-45", "--west", "-112.5", "--north", "-33.75",
            "--east", "-90", "harbor",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Search(_)));
    }

    #[test]
    fn test_error_reported_once() {
        let mut out = Vec::new();
        report_error(&mut out, &CliError::InvalidArgument("bad tile".into()));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "Error: Invalid argument: bad tile\n");
    }
}
