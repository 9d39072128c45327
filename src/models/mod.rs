pub mod listing;
pub mod watch_state;

// Re-exports for convenience
pub use listing::*;
pub use watch_state::*;
