/// Default scheduler interval in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 1_000;
/// Default tracing filter directive
pub const DEFAULT_LOG_LEVEL: &str = "info";
