//! Structured size metrics for the serde strategies.
//!
//! The `log_metric!` macro emits one key/value line per call on the
//! `pageserde::metrics` target at `trace` level. The line is only formatted
//! when that target is enabled, so the hot path pays a single level check.

/// The `log` target every metric line is written to.
pub(crate) const METRICS_TARGET: &str = "pageserde::metrics";

/// Logs a structured key-value metric line.
///
/// # Example
/// ```ignore
/// log_metric!("event" = "serialize", "logical_bytes" = logical.len());
/// ```
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        if log::log_enabled!(target: $crate::observability::METRICS_TARGET, log::Level::Trace) {
            let mut parts: Vec<String> = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            log::trace!(
                target: $crate::observability::METRICS_TARGET,
                "PAGESERDE_METRIC: {{ {} }}",
                parts.join(", ")
            );
        }
    };
}
