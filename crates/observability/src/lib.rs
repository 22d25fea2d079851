//! Process-wide logging setup shared by the binaries.

/// Initialize structured JSON logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::Json);
}

/// Initialize human-readable logging for local runs.
pub fn init_pretty() {
    tracing::init(LogFormat::Pretty);
}

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use self::tracing::LogFormat;
