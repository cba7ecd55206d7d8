//! Process-wide tracing setup for binaries and jobs that drive the billing
//! service.

pub mod tracing;

pub use self::tracing::{LogFormat, TracingConfig};

/// Initialize tracing with defaults (`RUST_LOG`, else `info`; JSON lines).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    self::tracing::init(&TracingConfig::default());
}
