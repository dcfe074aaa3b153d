use serde::Serialize;

use super::{foreign_key::ForeignKey, sql_type::SqlType};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub ordinal: i32,
    pub sql_type: SqlType,
    /// -1 if not applicable or `max`
    pub max_length: i64,
    pub precision: u8,
    pub scale: u8,
    pub is_nullable: bool,
    pub default_value: Option<String>,
    pub is_auto_increment: bool,
    pub auto_increment_seed: i64,
    pub auto_increment_step: i64,
    pub is_primary_key: bool,
    pub foreign_keys: Vec<ForeignKey>,
}

impl ColumnInfo {
    pub fn new(name: &str, ordinal: i32, sql_type: SqlType) -> Self {
        Self {
            name: name.to_string(),
            ordinal,
            sql_type,
            max_length: -1,
            precision: 0,
            scale: 0,
            is_nullable: true,
            default_value: None,
            is_auto_increment: false,
            auto_increment_seed: 0,
            auto_increment_step: 0,
            is_primary_key: false,
            foreign_keys: Vec::new(),
        }
    }

    pub fn is_identity_key(&self) -> bool {
        self.is_primary_key && self.is_auto_increment
    }

    pub fn type_declaration(&self) -> String {
        self.sql_type
            .declaration(self.max_length, self.precision, self.scale)
    }
}
