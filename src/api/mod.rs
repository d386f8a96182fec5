// API module
//
// HTTP surface over a single in-process ledger

pub mod handlers;
pub mod routes;

// Re-export main components for easier access
pub use handlers::{AppData, AppState};
pub use routes::configure_routes;
