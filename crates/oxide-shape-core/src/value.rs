//! SQL values bound as statement parameters and decoded from rows.

use std::fmt;

/// A SQL value that can be bound as a parameter or read back from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns the SQL representation for inline use (escaped).
    ///
    /// Builders never inline values; this is for logs and diagnostics.
    #[must_use]
    pub fn to_sql_inline(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(true) => String::from("TRUE"),
            Self::Bool(false) => String::from("FALSE"),
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Blob(bytes) => {
                let hex: String = bytes.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }

    /// Short name of the stored variant, used in decode errors.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "BOOL",
            Self::Int(_) => "INTEGER",
            Self::Float(_) => "REAL",
            Self::Text(_) => "TEXT",
            Self::Blob(_) => "BLOB",
        }
    }

    /// Returns `true` for [`SqlValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql_inline())
    }
}

/// Conversion of a Rust value into a bound parameter.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

/// Conversion of a stored value back into a Rust value.
///
/// `NULL` decodes to the type's zero value so that columns added by a
/// migration read back as empty on rows written before it.
pub trait FromSqlValue: Sized {
    /// Decodes `value`, returning it unchanged when it does not fit.
    ///
    /// # Errors
    ///
    /// Returns the original value if it cannot represent `Self`.
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlValue>;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlValue> {
        Ok(value)
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlValue> {
        match value {
            SqlValue::Null => Ok(false),
            SqlValue::Bool(b) => Ok(b),
            SqlValue::Int(n) => Ok(n != 0),
            other => Err(other),
        }
    }
}

macro_rules! lossless_int {
    ($($ty:ty),*) => {$(
        impl ToSqlValue for $ty {
            fn to_sql_value(self) -> SqlValue {
                SqlValue::Int(i64::from(self))
            }
        }

        impl FromSqlValue for $ty {
            fn from_sql_value(value: SqlValue) -> Result<Self, SqlValue> {
                match value {
                    SqlValue::Null => Ok(0),
                    SqlValue::Bool(b) => Ok(Self::from(b)),
                    SqlValue::Int(n) => Self::try_from(n).map_err(|_| SqlValue::Int(n)),
                    other => Err(other),
                }
            }
        }
    )*};
}

lossless_int!(i8, i16, i32, i64, u8, u16, u32);

// Wide unsigned and pointer-sized integers are stored bit for bit in the
// signed 64-bit column.
macro_rules! wrapping_int {
    ($($ty:ty),*) => {$(
        impl ToSqlValue for $ty {
            #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
            fn to_sql_value(self) -> SqlValue {
                SqlValue::Int(self as i64)
            }
        }

        impl FromSqlValue for $ty {
            #[allow(
                clippy::cast_sign_loss,
                clippy::cast_possible_truncation,
                clippy::cast_possible_wrap
            )]
            fn from_sql_value(value: SqlValue) -> Result<Self, SqlValue> {
                match value {
                    SqlValue::Null => Ok(0),
                    SqlValue::Bool(b) => Ok(Self::from(b)),
                    SqlValue::Int(n) => Ok(n as Self),
                    other => Err(other),
                }
            }
        }
    )*};
}

wrapping_int!(u64, usize, isize);

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl FromSqlValue for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlValue> {
        match value {
            SqlValue::Null => Ok(0.0),
            SqlValue::Float(f) => Ok(f),
            SqlValue::Int(n) => Ok(n as Self),
            other => Err(other),
        }
    }
}

impl FromSqlValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlValue> {
        f64::from_sql_value(value).map(|f| f as Self)
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlValue> {
        match value {
            SqlValue::Null => Ok(Self::new()),
            SqlValue::Text(s) => Ok(s),
            SqlValue::Blob(bytes) => Self::from_utf8(bytes).map_err(|e| SqlValue::Blob(e.into_bytes())),
            other => Err(other),
        }
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlValue> {
        match value {
            SqlValue::Null => Ok(Self::new()),
            SqlValue::Blob(bytes) => Ok(bytes),
            SqlValue::Text(s) => Ok(s.into_bytes()),
            other => Err(other),
        }
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        self.map_or(SqlValue::Null, ToSqlValue::to_sql_value)
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlValue> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_sql_value(value).map(Some)
        }
    }
}
