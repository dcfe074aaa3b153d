use anyhow::bail;
use serde::Serialize;
use serde_json::json;

use crate::error::Error;

use super::{bulk_op::BulkOp, column_info::ColumnInfo, record_descriptor::RecordDescriptor};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedColumn {
    pub field_index: usize,
    pub field_name: String,
    /// the declared alias if any, else the column name as reported by the catalog
    pub column_name: String,
    pub column: ColumnInfo,
}

/// Fields of a record type paired with the table columns they are written to / read from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordMapping {
    pub catalog: String,
    pub schema: String,
    pub tb: String,
    /// in field declaration order
    pub columns: Vec<MappedColumn>,
}

impl std::fmt::Display for RecordMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", json!(self))
    }
}

impl RecordMapping {
    /// Aliased fields claim their columns first (exact match), the remaining fields
    /// then match unclaimed columns by case-insensitive name. Unmatched columns are dropped.
    pub fn build<T>(
        descriptor: &RecordDescriptor<T>,
        catalog: &str,
        columns: &[ColumnInfo],
    ) -> anyhow::Result<Self> {
        let mut claimed = vec![false; columns.len()];
        let mut field_matches: Vec<Option<usize>> = vec![None; descriptor.fields.len()];

        for (field_index, field) in descriptor.fields.iter().enumerate() {
            if let Some(alias) = field.column_alias {
                let found = columns
                    .iter()
                    .enumerate()
                    .position(|(i, col)| !claimed[i] && col.name == alias);
                if let Some(i) = found {
                    claimed[i] = true;
                    field_matches[field_index] = Some(i);
                }
            }
        }

        for (field_index, field) in descriptor.fields.iter().enumerate() {
            if field.column_alias.is_some() {
                continue;
            }
            let found = columns
                .iter()
                .enumerate()
                .position(|(i, col)| !claimed[i] && field.matches_name(&col.name));
            if let Some(i) = found {
                claimed[i] = true;
                field_matches[field_index] = Some(i);
            }
        }

        let mut mapped = Vec::new();
        for (field_index, col_index) in field_matches.iter().enumerate() {
            if let Some(col_index) = col_index {
                let field = &descriptor.fields[field_index];
                let column = &columns[*col_index];
                mapped.push(MappedColumn {
                    field_index,
                    field_name: field.name.to_string(),
                    column_name: field
                        .column_alias
                        .map(str::to_string)
                        .unwrap_or_else(|| column.name.clone()),
                    column: column.clone(),
                });
            }
        }

        let me = Self {
            catalog: catalog.to_string(),
            schema: descriptor.resolved_schema().to_string(),
            tb: descriptor.resolved_table().to_string(),
            columns: mapped,
        };
        me.check_identity_key(descriptor.type_name)?;
        Ok(me)
    }

    fn check_identity_key(&self, type_name: &str) -> anyhow::Result<()> {
        let count = self
            .columns
            .iter()
            .filter(|c| c.column.is_identity_key())
            .count();
        if count != 1 {
            bail! {Error::ConfigError(format!(
                "record {} mapped to {}.{}.{} must map exactly one identity primary key column, \
                 found {}",
                type_name, self.catalog, self.schema, self.tb, count
            ))}
        }
        Ok(())
    }

    pub fn identity_column(&self) -> Option<&MappedColumn> {
        self.columns.iter().find(|c| c.column.is_identity_key())
    }

    pub fn primary_key_columns(&self) -> Vec<&MappedColumn> {
        self.columns
            .iter()
            .filter(|c| c.column.is_primary_key)
            .collect()
    }

    /// Columns written by value, auto-increment columns excluded.
    pub fn value_columns(&self) -> Vec<&MappedColumn> {
        self.columns
            .iter()
            .filter(|c| !c.column.is_auto_increment)
            .collect()
    }

    /// Column list of the transient bulk parameter type for the given operation.
    pub fn bulk_columns(&self, op: BulkOp) -> Vec<&MappedColumn> {
        if op.includes_auto_increment() {
            self.columns.iter().collect()
        } else {
            self.value_columns()
        }
    }
}
