use anyhow::Context;
use tm_common::meta::{db_row::DbRow, record_descriptor::RecordDescriptor};

pub struct RowMaterializer {}

impl RowMaterializer {
    pub fn materialize<T: Default>(
        descriptor: &RecordDescriptor<T>,
        rows: Vec<DbRow>,
    ) -> anyhow::Result<Vec<T>> {
        rows.into_iter()
            .map(|row| Self::materialize_row(descriptor, row))
            .collect()
    }

    /// Columns without a matching field are skipped, fields without a column keep their default.
    pub fn materialize_row<T: Default>(
        descriptor: &RecordDescriptor<T>,
        row: DbRow,
    ) -> anyhow::Result<T> {
        let mut record = T::default();
        for (col, value) in row.cols.into_iter().zip(row.values.into_iter()) {
            if let Some((_, field)) = descriptor.find_field(&col) {
                field.set(&mut record, value).with_context(|| {
                    format!(
                        "failed to read column {} into {}.{}",
                        col, descriptor.type_name, field.name
                    )
                })?;
            }
        }
        Ok(record)
    }
}
