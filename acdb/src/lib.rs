//! ACDB - offline marine points-of-interest database
//!
//! A local replica of a server-hosted marker (point of interest) and review
//! database, partitioned into a 16×16 grid of geographic tiles. The host
//! application fetches data over the network; this crate installs tile
//! bundles, applies incremental sync responses idempotently, answers
//! bounding-box queries, and parses `acdb://` deep links.
//!
//! # Modules
//!
//! - [`tile`]: grid addressing and bounding boxes
//! - [`model`]: markers, reviews and last-update bookkeeping
//! - [`store`]: tile-partitioned storage with per-tile locking
//! - [`sync`]: response payloads, the merge engine and sync planning
//! - [`search`]: spatial queries
//! - [`action`]: `acdb://` URL parsing
//! - [`export`]: verification of downloaded tile exports
//! - [`config`] / [`logging`]: INI configuration and tracing setup
//!
//! [`ActiveCaptainDatabase`] ties these together behind one type.

pub mod action;
pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod logging;
pub mod model;
pub mod search;
pub mod store;
pub mod sync;
pub mod tile;
pub mod wire;

pub use database::ActiveCaptainDatabase;
pub use error::{AcdbError, AcdbResult};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
