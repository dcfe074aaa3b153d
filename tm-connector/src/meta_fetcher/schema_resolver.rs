use tm_common::{
    log_debug,
    meta::{record_descriptor::RecordDescriptor, record_mapping::RecordMapping},
};

use crate::sql_connection::SqlConnection;

use super::schema_cache::SchemaCache;

pub struct SchemaResolver {}

impl SchemaResolver {
    /// Maps a record type onto its table through the cache.
    /// A mapping without exactly one identity primary key is a `ConfigError`.
    pub async fn resolve<T>(
        conn: &mut SqlConnection,
        cache: &SchemaCache,
        descriptor: &RecordDescriptor<T>,
    ) -> anyhow::Result<RecordMapping> {
        let catalog = conn.config().catalog.clone();
        let cols = cache
            .get(
                conn,
                &catalog,
                descriptor.resolved_schema(),
                descriptor.resolved_table(),
            )
            .await?;
        let mapping = RecordMapping::build(descriptor, &catalog, &cols)?;
        log_debug!("record {} resolved: {}", descriptor.type_name, mapping);
        Ok(mapping)
    }
}
