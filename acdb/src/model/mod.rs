//! Records owned by the tile store.
//!
//! - **Marker**: a point of interest, owned by the tile containing its position
//! - **Review**: a captain's review, owned by its marker's tile at creation
//! - **LastUpdateInfo**: per-tile sync bookkeeping for markers and reviews
//! - **DatabaseVersion**: content version of the installed data

mod last_update;
mod marker;
mod review;

pub use last_update::{DatabaseVersion, LastUpdateInfo, ParseVersionError};
pub use marker::{MapIcon, Marker, MarkerId, MarkerType};
pub use review::{Review, ReviewId, MAX_RATING};

pub(crate) use last_update::format_timestamp;
