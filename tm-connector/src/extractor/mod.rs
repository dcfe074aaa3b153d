pub mod record_extractor;
pub mod row_materializer;
