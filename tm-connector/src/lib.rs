#![allow(clippy::manual_range_contains)]
#![allow(clippy::needless_range_loop)]

pub mod bulk_query_builder;
pub mod bulk_type_manager;
pub mod driver;
pub mod extractor;
pub mod meta_fetcher;
pub mod sinker;
pub mod sql_connection;
pub mod sql_table;
