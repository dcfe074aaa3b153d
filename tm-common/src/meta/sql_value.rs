use anyhow::bail;
use serde::Serialize;

use crate::error::Error;

/// Untyped cell value exchanged with the driver, both as bound parameter and as result value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SqlValue {
    None,
    Bool(bool),
    TinyInt(u8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Float(f64),
    Decimal(String),
    String(String),
    DateTime(String),
    Guid(String),
    Binary(Vec<u8>),
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.to_option_string().unwrap_or_else(|| "NULL".to_string())
        )
    }
}

impl SqlValue {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn to_option_string(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Bool(v) => Some(if *v { "1".into() } else { "0".into() }),
            Self::TinyInt(v) => Some(v.to_string()),
            Self::SmallInt(v) => Some(v.to_string()),
            Self::Int(v) => Some(v.to_string()),
            Self::BigInt(v) => Some(v.to_string()),
            Self::Real(v) => Some(v.to_string()),
            Self::Float(v) => Some(v.to_string()),
            Self::Decimal(v) | Self::String(v) | Self::DateTime(v) | Self::Guid(v) => {
                Some(v.clone())
            }
            Self::Binary(v) => Some(hex::encode_upper(v)),
        }
    }

    pub fn as_i64(&self) -> anyhow::Result<Option<i64>> {
        let v = match self {
            Self::None => return Ok(None),
            Self::Bool(v) => *v as i64,
            Self::TinyInt(v) => *v as i64,
            Self::SmallInt(v) => *v as i64,
            Self::Int(v) => *v as i64,
            Self::BigInt(v) => *v,
            Self::Decimal(v) | Self::String(v) => match v.trim().parse::<i64>() {
                Ok(v) => v,
                Err(_) => return Self::conversion_error(self, "integer"),
            },
            _ => return Self::conversion_error(self, "integer"),
        };
        Ok(Some(v))
    }

    pub fn as_f64(&self) -> anyhow::Result<Option<f64>> {
        let v = match self {
            Self::None => return Ok(None),
            Self::Real(v) => *v as f64,
            Self::Float(v) => *v,
            Self::Decimal(v) | Self::String(v) => match v.trim().parse::<f64>() {
                Ok(v) => v,
                Err(_) => return Self::conversion_error(self, "float"),
            },
            _ => match self.as_i64()? {
                Some(v) => v as f64,
                None => return Ok(None),
            },
        };
        Ok(Some(v))
    }

    fn conversion_error<T>(value: &SqlValue, target: &str) -> anyhow::Result<T> {
        bail! {Error::MappingError(format!(
            "can not convert {:?} into {}",
            value, target
        ))}
    }
}

pub trait ToSqlValue {
    fn to_sql_value(&self) -> SqlValue;
}

/// `SqlValue::None` becomes the zero value of the target, or `None` for `Option<T>`.
pub trait FromSqlValue: Sized {
    fn from_sql_value(value: SqlValue) -> anyhow::Result<Self>;
}

macro_rules! impl_int_sql_value {
    ($t:ty, $variant:ident) => {
        impl ToSqlValue for $t {
            fn to_sql_value(&self) -> SqlValue {
                SqlValue::$variant(*self)
            }
        }

        impl FromSqlValue for $t {
            fn from_sql_value(value: SqlValue) -> anyhow::Result<Self> {
                match value.as_i64()? {
                    None => Ok(<$t>::default()),
                    Some(v) => match <$t>::try_from(v) {
                        Ok(v) => Ok(v),
                        Err(_) => bail! {Error::MappingError(format!(
                            "value {} is out of range for {}",
                            v,
                            stringify!($t)
                        ))},
                    },
                }
            }
        }
    };
}

impl_int_sql_value!(u8, TinyInt);
impl_int_sql_value!(i16, SmallInt);
impl_int_sql_value!(i32, Int);
impl_int_sql_value!(i64, BigInt);

impl ToSqlValue for f32 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Real(*self)
    }
}

impl FromSqlValue for f32 {
    fn from_sql_value(value: SqlValue) -> anyhow::Result<Self> {
        Ok(value.as_f64()?.unwrap_or_default() as f32)
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Float(*self)
    }
}

impl FromSqlValue for f64 {
    fn from_sql_value(value: SqlValue) -> anyhow::Result<Self> {
        Ok(value.as_f64()?.unwrap_or_default())
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: SqlValue) -> anyhow::Result<Self> {
        match value {
            SqlValue::None => Ok(false),
            SqlValue::Bool(v) => Ok(v),
            SqlValue::String(ref v) if v.eq_ignore_ascii_case("true") => Ok(true),
            SqlValue::String(ref v) if v.eq_ignore_ascii_case("false") => Ok(false),
            other => Ok(other.as_i64()?.unwrap_or_default() != 0),
        }
    }
}

impl ToSqlValue for String {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::String(self.clone())
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue) -> anyhow::Result<Self> {
        Ok(value.to_option_string().unwrap_or_default())
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Binary(self.clone())
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: SqlValue) -> anyhow::Result<Self> {
        match value {
            SqlValue::None => Ok(Vec::new()),
            SqlValue::Binary(v) => Ok(v),
            // binary columns are selected as hex text
            SqlValue::String(v) => match hex::decode(v.trim_start_matches("0x")) {
                Ok(v) => Ok(v),
                Err(e) => bail! {Error::MappingError(format!(
                    "can not decode hex binary value: {}",
                    e
                ))},
            },
            other => SqlValue::conversion_error(&other, "binary"),
        }
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(&self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::None,
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue) -> anyhow::Result<Self> {
        if value.is_none() {
            return Ok(None);
        }
        Ok(Some(T::from_sql_value(value)?))
    }
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(&self) -> SqlValue {
        self.clone()
    }
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: SqlValue) -> anyhow::Result<Self> {
        Ok(value)
    }
}
