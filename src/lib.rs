pub mod config;
pub mod engine;
pub mod fetcher;
pub mod models;
pub mod notifier;
pub mod plugins;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use engine::{DiffResult, PairOutcome, WatchEngine};
pub use registry::KeywordRegistry;
pub use scheduler::{TickSummary, WatchScheduler};
pub use utils::error::{AppError, FetchError, SinkError};

pub type Result<T> = std::result::Result<T, AppError>;
