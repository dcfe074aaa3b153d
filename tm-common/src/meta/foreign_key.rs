use serde::Serialize;

/// parent: the referenced (key) side, child: the referencing side
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub name: String,
    pub parent_schema: String,
    pub parent_tb: String,
    pub parent_col: String,
    pub child_schema: String,
    pub child_tb: String,
    pub child_col: String,
}

impl ForeignKey {
    pub fn is_parent(&self, schema: &str, tb: &str) -> bool {
        self.parent_schema.eq_ignore_ascii_case(schema) && self.parent_tb.eq_ignore_ascii_case(tb)
    }

    pub fn is_child(&self, schema: &str, tb: &str) -> bool {
        self.child_schema.eq_ignore_ascii_case(schema) && self.child_tb.eq_ignore_ascii_case(tb)
    }
}
