pub mod bulk_config;
pub mod connection_config;
pub mod ini_loader;
pub mod runtime_config;
