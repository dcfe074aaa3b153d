pub mod config;
pub mod error;
pub mod logger;
pub mod meta;
pub mod utils;
