pub mod bulk_sinker;
