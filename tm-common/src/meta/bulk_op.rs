use serde::Serialize;
use strum::{Display, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, IntoStaticStr)]
pub enum BulkOp {
    #[strum(serialize = "insert")]
    Insert,
    #[strum(serialize = "update")]
    Update,
    #[strum(serialize = "delete")]
    Delete,
}

impl BulkOp {
    /// Inserts leave identity values to the server, updates and deletes need them to match rows.
    pub fn includes_auto_increment(&self) -> bool {
        !matches!(self, Self::Insert)
    }
}
