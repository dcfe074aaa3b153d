use anyhow::bail;
use serde::Serialize;

use crate::error::Error;

use super::sql_value::SqlValue;

/// One result row normalized by the driver: column labels in select order with their values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DbRow {
    pub cols: Vec<String>,
    pub values: Vec<SqlValue>,
}

impl DbRow {
    pub fn from_pairs(pairs: Vec<(&str, SqlValue)>) -> Self {
        let mut row = Self::default();
        for (col, value) in pairs {
            row.cols.push(col.to_string());
            row.values.push(value);
        }
        row
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    /// Column labels compare case-insensitively, as the server does.
    pub fn get(&self, col: &str) -> Option<&SqlValue> {
        self.cols
            .iter()
            .position(|c| c.eq_ignore_ascii_case(col))
            .map(|i| &self.values[i])
    }

    pub fn get_optional_string(&self, col: &str) -> anyhow::Result<Option<String>> {
        Ok(self.get_required(col)?.to_option_string())
    }

    pub fn get_string(&self, col: &str) -> anyhow::Result<String> {
        match self.get_optional_string(col)? {
            Some(v) => Ok(v),
            None => bail! {Error::MetadataError(format!("column {} is NULL", col))},
        }
    }

    pub fn get_optional_i64(&self, col: &str) -> anyhow::Result<Option<i64>> {
        self.get_required(col)?.as_i64()
    }

    pub fn get_i64(&self, col: &str) -> anyhow::Result<i64> {
        match self.get_optional_i64(col)? {
            Some(v) => Ok(v),
            None => bail! {Error::MetadataError(format!("column {} is NULL", col))},
        }
    }

    fn get_required(&self, col: &str) -> anyhow::Result<&SqlValue> {
        match self.get(col) {
            Some(v) => Ok(v),
            None => bail! {Error::MetadataError(format!(
                "column {} not found in result row",
                col
            ))},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get() {
        let row = DbRow::from_pairs(vec![
            ("COLUMN_NAME", SqlValue::String("Id".into())),
            ("ORDINAL_POSITION", SqlValue::Int(1)),
            ("COLUMN_DEFAULT", SqlValue::None),
        ]);
        assert_eq!(row.len(), 3);
        assert_eq!(row.get_string("column_name").unwrap(), "Id");
        assert_eq!(row.get_i64("Ordinal_Position").unwrap(), 1);
        assert_eq!(row.get_optional_string("COLUMN_DEFAULT").unwrap(), None);
        assert!(row.get_string("COLUMN_DEFAULT").is_err());
        assert!(row.get_i64("MISSING").is_err());
    }
}
