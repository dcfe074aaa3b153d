use super::sql_value::{FromSqlValue, SqlValue, ToSqlValue};

pub const DEFAULT_SCHEMA: &str = "dbo";

type Getter<T> = Box<dyn Fn(&T) -> SqlValue + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, SqlValue) -> anyhow::Result<()> + Send + Sync>;

/// A record type that can be written to and read from a table.
///
/// The descriptor is the explicit field table of the type, built once by `SqlTable`:
///
/// ```ignore
/// impl Record for User {
///     fn descriptor() -> RecordDescriptor<Self> {
///         RecordDescriptor::<Self>::new("User")
///             .table("Users")
///             .field("id", |r| &r.id, |r| &mut r.id)
///             .aliased_field("first_name", "FirstName", |r| &r.first_name, |r| &mut r.first_name)
///     }
/// }
/// ```
pub trait Record: Default + Send + Sync + 'static {
    fn descriptor() -> RecordDescriptor<Self>;
}

pub struct FieldDescriptor<T> {
    pub name: &'static str,
    pub column_alias: Option<&'static str>,
    getter: Getter<T>,
    setter: Setter<T>,
}

impl<T> FieldDescriptor<T> {
    pub fn get(&self, record: &T) -> SqlValue {
        (self.getter)(record)
    }

    pub fn set(&self, record: &mut T, value: SqlValue) -> anyhow::Result<()> {
        (self.setter)(record, value)
    }

    pub fn matches_alias(&self, col: &str) -> bool {
        self.column_alias == Some(col)
    }

    /// Fields carrying an alias are only ever matched through it.
    pub fn matches_name(&self, col: &str) -> bool {
        self.column_alias.is_none() && self.name.eq_ignore_ascii_case(col)
    }
}

pub struct RecordDescriptor<T> {
    pub type_name: &'static str,
    pub table: Option<&'static str>,
    pub schema: Option<&'static str>,
    pub fields: Vec<FieldDescriptor<T>>,
}

impl<T: 'static> RecordDescriptor<T> {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            table: None,
            schema: None,
            fields: Vec::new(),
        }
    }

    pub fn table(mut self, table: &'static str) -> Self {
        self.table = Some(table);
        self
    }

    pub fn schema(mut self, schema: &'static str) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn field<F>(
        self,
        name: &'static str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self
    where
        F: ToSqlValue + FromSqlValue + 'static,
    {
        self.push_field(name, None, get, get_mut)
    }

    pub fn aliased_field<F>(
        self,
        name: &'static str,
        column_alias: &'static str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self
    where
        F: ToSqlValue + FromSqlValue + 'static,
    {
        self.push_field(name, Some(column_alias), get, get_mut)
    }

    fn push_field<F>(
        mut self,
        name: &'static str,
        column_alias: Option<&'static str>,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self
    where
        F: ToSqlValue + FromSqlValue + 'static,
    {
        self.fields.push(FieldDescriptor {
            name,
            column_alias,
            getter: Box::new(move |record| get(record).to_sql_value()),
            setter: Box::new(move |record, value| {
                *get_mut(record) = F::from_sql_value(value)?;
                Ok(())
            }),
        });
        self
    }
}

impl<T> RecordDescriptor<T> {
    pub fn resolved_schema(&self) -> &'static str {
        self.schema.unwrap_or(DEFAULT_SCHEMA)
    }

    pub fn resolved_table(&self) -> &'static str {
        self.table.unwrap_or(self.type_name)
    }

    /// Alias match first, then case-insensitive field name match.
    pub fn find_field(&self, col: &str) -> Option<(usize, &FieldDescriptor<T>)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.matches_alias(col))
            .or_else(|| {
                self.fields
                    .iter()
                    .enumerate()
                    .find(|(_, f)| f.matches_name(col))
            })
    }
}
