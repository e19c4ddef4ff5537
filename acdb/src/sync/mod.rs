//! Synchronization: response payloads, the merge engine and sync planning.

mod engine;
mod payload;
mod status;

pub use engine::SyncEngine;
pub use payload::{
    CreateMarkerResponse, MoveMarkerResponse, SyncMarkersResponse, SyncReviewsResponse,
    VoteForReviewResponse, WebViewResponse,
};
pub use status::{
    needs_follow_up, SyncPlan, SyncStatusRequest, SyncStatusResponse, SyncStatusType,
};
