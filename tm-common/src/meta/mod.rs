pub mod bulk_op;
pub mod column_info;
pub mod db_row;
pub mod foreign_key;
pub mod record_descriptor;
pub mod record_mapping;
pub mod sql_type;
pub mod sql_value;
