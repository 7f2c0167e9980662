//! HTTP surface for the run task queue.

pub mod api;
pub mod db;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
