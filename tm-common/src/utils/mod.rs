pub mod error_sink;
pub mod log_util;
pub mod sql_util;
