use anyhow::bail;
use tm_common::{
    config::bulk_config::{BulkConfig, SERVER_MAX_VALUES_ROWS},
    error::Error,
    meta::{
        bulk_op::BulkOp,
        record_descriptor::RecordDescriptor,
        record_mapping::{MappedColumn, RecordMapping},
        sql_value::SqlValue,
    },
    utils::sql_util::SqlUtil,
};

const TVP_ALIAS: &str = "tvp";

pub struct BulkQueryInfo {
    pub sql: String,
    pub binds: Vec<SqlValue>,
}

/// Builds the statements of a bulk call for one resolved mapping.
/// Column names come from the mapping (alias, else catalog name), never from field names.
pub struct BulkQueryBuilder<'a> {
    mapping: &'a RecordMapping,
    bulk: &'a BulkConfig,
}

impl BulkQueryBuilder<'_> {
    pub fn new<'a>(mapping: &'a RecordMapping, bulk: &'a BulkConfig) -> BulkQueryBuilder<'a> {
        BulkQueryBuilder { mapping, bulk }
    }

    pub fn get_statement_sql(&self, op: BulkOp) -> anyhow::Result<String> {
        match op {
            BulkOp::Insert => self.get_insert_sql(),
            BulkOp::Update => self.get_update_sql(),
            BulkOp::Delete => self.get_delete_sql(),
        }
    }

    /// INSERT INTO dbo.Users (FirstName,LastName) SELECT tvp.FirstName,tvp.LastName FROM @TVP AS tvp
    pub fn get_insert_sql(&self) -> anyhow::Result<String> {
        let cols = self.escape_cols(&self.non_empty(self.mapping.value_columns(), "insert")?)?;
        let tvp_cols: Vec<String> = cols
            .iter()
            .map(|col| format!("{}.{}", TVP_ALIAS, col))
            .collect();

        Ok(format!(
            "INSERT INTO {} ({}) SELECT {} FROM {} AS {}",
            self.qualified_tb()?,
            cols.join(","),
            tvp_cols.join(","),
            self.bulk.bulk_param_name,
            TVP_ALIAS
        ))
    }

    /// Rows are joined on every mapped primary key column, identity columns are never set.
    pub fn get_update_sql(&self) -> anyhow::Result<String> {
        let tb = SqlUtil::format_identifier(&self.mapping.tb)?;
        let set_cols = self.non_empty(self.mapping.value_columns(), "update")?;
        let set_cols = self.escape_cols(&set_cols)?;
        let set_pairs: Vec<String> = set_cols
            .iter()
            .map(|col| format!("{}.{} = {}.{}", tb, col, TVP_ALIAS, col))
            .collect();

        let key_cols = self.non_empty(self.mapping.primary_key_columns(), "update")?;
        let key_cols = self.escape_cols(&key_cols)?;
        let on_pairs: Vec<String> = key_cols
            .iter()
            .map(|col| format!("{}.{} = {}.{}", tb, col, TVP_ALIAS, col))
            .collect();

        let qualified_tb = self.qualified_tb()?;
        Ok(format!(
            "UPDATE {} SET {} FROM {} INNER JOIN {} AS {} ON {}",
            qualified_tb,
            set_pairs.join(","),
            qualified_tb,
            self.bulk.bulk_param_name,
            TVP_ALIAS,
            on_pairs.join(" AND ")
        ))
    }

    /// A row is deleted only if every mapped column equals the bulk row, NULLs included,
    /// so a record whose fields drifted from the stored row deletes nothing.
    /// The select list follows the bulk type column order for `tvp.*` to line up.
    pub fn get_delete_sql(&self) -> anyhow::Result<String> {
        let tb = SqlUtil::format_identifier(&self.mapping.tb)?;
        let cols = self.escape_cols(&self.mapping.bulk_columns(BulkOp::Delete))?;
        let row_cols: Vec<String> = cols.iter().map(|col| format!("{}.{}", tb, col)).collect();

        Ok(format!(
            "DELETE FROM {} WHERE EXISTS (SELECT {} INTERSECT SELECT {}.* FROM {} AS {})",
            self.qualified_tb()?,
            row_cols.join(","),
            TVP_ALIAS,
            self.bulk.bulk_param_name,
            TVP_ALIAS
        ))
    }

    pub fn get_select_sql(&self) -> anyhow::Result<String> {
        let mut exprs = Vec::new();
        for col in self.mapping.columns.iter() {
            let name = SqlUtil::format_identifier(&col.column_name)?;
            exprs.push(col.column.sql_type.select_expr(&name));
        }
        let tb = self.qualified_tb()?;
        Ok(format!("SELECT {} FROM {}", exprs.join(","), tb))
    }

    /// Rows per batch so that neither the bind parameter ceiling nor the
    /// row constructor limit of one VALUES list is exceeded.
    pub fn get_batch_size(&self, op: BulkOp) -> usize {
        let col_count = self.mapping.bulk_columns(op).len().max(1);
        (self.bulk.max_bind_params / col_count).clamp(1, SERVER_MAX_VALUES_ROWS)
    }

    /// One batch: fill the bulk parameter with `records`, then run `statement` against it.
    pub fn get_batch_query<T>(
        &self,
        op: BulkOp,
        type_name: &str,
        descriptor: &RecordDescriptor<T>,
        records: &[T],
        statement: &str,
    ) -> anyhow::Result<BulkQueryInfo> {
        let cols = self.mapping.bulk_columns(op);
        let escaped_cols = self.escape_cols(&cols)?;

        let mut placeholder_index = 1;
        let mut row_values = Vec::new();
        let mut binds = Vec::new();
        for record in records.iter() {
            let mut placeholders = Vec::new();
            for col in cols.iter() {
                placeholders.push(self.get_placeholder(placeholder_index, col));
                placeholder_index += 1;
                binds.push(descriptor.fields[col.field_index].get(record));
            }
            row_values.push(format!("({})", placeholders.join(",")));
        }

        let sql = format!(
            "SET NOCOUNT ON; DECLARE {} {}; INSERT INTO {} ({}) VALUES {}; SET NOCOUNT OFF; {}",
            self.bulk.bulk_param_name,
            SqlUtil::format_qualified(&self.mapping.schema, type_name)?,
            self.bulk.bulk_param_name,
            escaped_cols.join(","),
            row_values.join(","),
            statement
        );
        Ok(BulkQueryInfo { sql, binds })
    }

    pub fn get_batch_queries<T>(
        &self,
        op: BulkOp,
        type_name: &str,
        descriptor: &RecordDescriptor<T>,
        records: &[T],
    ) -> anyhow::Result<Vec<BulkQueryInfo>> {
        let statement = self.get_statement_sql(op)?;
        let batch_size = self.get_batch_size(op);
        let mut queries = Vec::new();
        for chunk in records.chunks(batch_size) {
            let query = self.get_batch_query(op, type_name, descriptor, chunk, &statement)?;
            queries.push(query);
        }
        Ok(queries)
    }

    fn get_placeholder(&self, index: usize, col: &MappedColumn) -> String {
        // binary values are bound as hex text
        if col.column.sql_type.is_binary() {
            format!("CONVERT(varbinary(max), @p{}, 2)", index)
        } else {
            format!("@p{}", index)
        }
    }

    fn qualified_tb(&self) -> anyhow::Result<String> {
        SqlUtil::format_qualified(&self.mapping.schema, &self.mapping.tb)
    }

    fn escape_cols(&self, cols: &[&MappedColumn]) -> anyhow::Result<Vec<String>> {
        cols.iter()
            .map(|col| SqlUtil::format_identifier(&col.column_name))
            .collect()
    }

    fn non_empty<'a>(
        &self,
        cols: Vec<&'a MappedColumn>,
        action: &str,
    ) -> anyhow::Result<Vec<&'a MappedColumn>> {
        if cols.is_empty() {
            bail! {Error::MappingError(format!(
                "no mapped columns to {} in {}.{}",
                action, self.mapping.schema, self.mapping.tb
            ))}
        }
        Ok(cols)
    }
}
