//! Process-wide tracing setup.

pub mod tracing;

/// Initialize tracing for the process.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init();
}
