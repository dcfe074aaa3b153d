use std::sync::Arc;

use crate::log_error;

/// Receives a human readable message for every failure that ends in a failure sentinel.
/// Never invoked on success paths.
pub type ErrorSink = Arc<dyn Fn(&str) + Send + Sync>;

pub fn default_error_sink() -> ErrorSink {
    Arc::new(|msg: &str| {
        log_error!("{}", msg);
    })
}
