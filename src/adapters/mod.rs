// Adapters - External system implementations

pub mod json_catalog;
pub mod log_continuation;
pub mod toml_config;
pub mod tracing_log;

// Re-export adapters
pub use json_catalog::JsonFormatCatalog;
pub use log_continuation::LoggingContinuation;
pub use toml_config::AppConfig;
pub use tracing_log::{LogFormat, LoggingConfig};
