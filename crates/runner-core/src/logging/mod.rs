// Interaction log shown in the UI
pub mod store;

// Process diagnostics through the tracing ecosystem
pub mod tracing;

pub use self::store::{LogLevel, LogRecord, LogStore, LogStoreConfig, LogStoreError};
pub use self::tracing::{init_tracing, TracingGuard};
