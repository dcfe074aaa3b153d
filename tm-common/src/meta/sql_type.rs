use std::str::FromStr;

use anyhow::bail;
use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::Error;

/// Declared column types as reported by INFORMATION_SCHEMA.COLUMNS.DATA_TYPE.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SqlType {
    BigInt,
    Binary,
    Bit,
    Char,
    Date,
    DateTime,
    DateTime2,
    DateTimeOffset,
    Decimal,
    Float,
    Image,
    Int,
    Money,
    NChar,
    NText,
    Numeric,
    NVarChar,
    Real,
    SmallDateTime,
    SmallInt,
    SmallMoney,
    Text,
    Time,
    Timestamp,
    TinyInt,
    UniqueIdentifier,
    VarBinary,
    VarChar,
    Xml,
}

impl SqlType {
    pub fn from_type_name(type_name: &str) -> anyhow::Result<Self> {
        match Self::from_str(type_name.trim()) {
            Ok(sql_type) => Ok(sql_type),
            Err(_) => bail! {Error::UnsupportedType(format!(
                "column type `{}` is not supported",
                type_name
            ))},
        }
    }

    /// char/varchar/nchar/nvarchar/binary/varbinary take `(n)` or `(max)`
    pub fn requires_length(&self) -> bool {
        matches!(
            self,
            Self::Char
                | Self::VarChar
                | Self::NChar
                | Self::NVarChar
                | Self::Binary
                | Self::VarBinary
        )
    }

    pub fn has_precision_scale(&self) -> bool {
        matches!(self, Self::Decimal | Self::Numeric)
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary | Self::VarBinary | Self::Image)
    }

    /// Column declaration as used in `CREATE TYPE ... AS TABLE`.
    pub fn declaration(&self, max_length: i64, precision: u8, scale: u8) -> String {
        let name: &'static str = self.into();
        if self.requires_length() {
            if max_length < 0 {
                return format!("{}(max)", name);
            }
            return format!("{}({})", name, max_length.max(1));
        }
        if self.has_precision_scale() && precision > 0 {
            return format!("{}({},{})", name, precision, scale);
        }
        name.to_string()
    }

    /// Types the driver decodes natively are selected as is,
    /// the rest are converted to text on the server.
    pub fn select_expr(&self, col: &str) -> String {
        match self {
            Self::Bit
            | Self::SmallInt
            | Self::Int
            | Self::BigInt
            | Self::Real
            | Self::Float
            | Self::Char
            | Self::VarChar
            | Self::NChar
            | Self::NVarChar => col.to_string(),
            Self::TinyInt => format!("CAST({} AS smallint) AS {}", col, col),
            Self::Binary | Self::VarBinary | Self::Image | Self::Timestamp => {
                format!(
                    "CONVERT(varchar(max), CAST({} AS varbinary(max)), 2) AS {}",
                    col, col
                )
            }
            Self::DateTimeOffset => format!("CONVERT(nvarchar(40), {}, 127) AS {}", col, col),
            Self::Date | Self::DateTime | Self::DateTime2 | Self::SmallDateTime | Self::Time => {
                format!("CONVERT(nvarchar(40), {}, 126) AS {}", col, col)
            }
            Self::Decimal
            | Self::Numeric
            | Self::Money
            | Self::SmallMoney
            | Self::UniqueIdentifier => format!("CONVERT(nvarchar(64), {}) AS {}", col, col),
            Self::Text | Self::NText | Self::Xml => {
                format!("CONVERT(nvarchar(max), {}) AS {}", col, col)
            }
        }
    }
}
