pub mod mssql_meta_fetcher;
pub mod schema_cache;
pub mod schema_resolver;
