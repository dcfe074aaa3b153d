#[macro_export(local_inner_macros)]
macro_rules! log_sql {
    ($($arg:tt)+) => (log::log!(target: "sql_logger", log::Level::Debug, $($arg)+));
}

#[macro_export(local_inner_macros)]
macro_rules! log_error {
    ($($arg:tt)+) => (log::log!(target: "default_logger", log::Level::Error, $($arg)+))
}

#[macro_export(local_inner_macros)]
macro_rules! log_info {
    ($($arg:tt)+) => (log::log!(target: "default_logger", log::Level::Info, $($arg)+));
}

#[macro_export(local_inner_macros)]
macro_rules! log_warn {
    ($($arg:tt)+) => (log::log!(target: "default_logger", log::Level::Warn, $($arg)+))
}

#[macro_export(local_inner_macros)]
macro_rules! log_debug {
    ($($arg:tt)+) => (log::log!(target: "default_logger", log::Level::Debug, $($arg)+))
}
