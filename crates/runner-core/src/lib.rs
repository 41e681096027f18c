pub mod config;
pub mod context;
pub mod logging;

pub use config::{Config, ConfigError, LoadedConfig};
pub use context::{Role, SessionState, Turn};
pub use logging::store::{LogLevel, LogRecord, LogStore, LogStoreConfig, LogStoreError};
pub use logging::tracing::{init_tracing, TracingGuard};
