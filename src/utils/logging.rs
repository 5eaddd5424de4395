use serde::Serialize;
use tracing::{Level, debug, enabled};

/// Emits a finished sync report as one JSON field, only when debug logging is on.
pub(crate) fn debug_sync_report<T: Serialize>(key: &str, report: &T) {
    if !enabled!(Level::DEBUG) {
        return;
    }
    match serde_json::to_string(report) {
        Ok(json) => debug!(key, report = %json, "sync finished"),
        Err(error) => debug!(key, %error, "sync finished; report not serializable"),
    }
}
