//! Compile-time description of a struct mapped to a table.
//!
//! Types implement [`Record`] (normally through `#[derive(Record)]`) to list
//! their fields, hand out column values and rebuild themselves from a row.
//! Table descriptors and builders work from this description only, so field
//! enumeration and value extraction are checked statically.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use crate::error::{Result, ShapeError};
use crate::value::{FromSqlValue, SqlValue};

/// Value kind of a field, used to infer its SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Boolean.
    Bool,
    /// Signed integer of the given byte width.
    Int(u8),
    /// Unsigned integer of the given byte width.
    UInt(u8),
    /// Floating point.
    Float,
    /// Text.
    Text,
    /// Raw bytes. Needs an explicit `TYPE`.
    Blob,
    /// Any other kind, carrying the Rust type name. Needs an explicit `TYPE`.
    Unsupported(&'static str),
}

impl ValueKind {
    /// Inferred SQL type token, if the kind has one.
    #[must_use]
    pub fn sql_type(self) -> Option<String> {
        match self {
            Self::Bool => Some(String::from("INTEGER(1)")),
            Self::Int(width) | Self::UInt(width) => Some(format!("INTEGER({width})")),
            Self::Float => Some(String::from("REAL")),
            Self::Text => Some(String::from("TEXT(4096)")),
            Self::Blob | Self::Unsupported(_) => None,
        }
    }

    /// Human-readable name used in configuration errors.
    #[must_use]
    pub fn describe(self) -> String {
        match self {
            Self::Bool => String::from("bool"),
            Self::Int(width) => format!("i{}", u32::from(width) * 8),
            Self::UInt(width) => format!("u{}", u32::from(width) * 8),
            Self::Float => String::from("float"),
            Self::Text => String::from("text"),
            Self::Blob => String::from("blob"),
            Self::Unsupported(name) => String::from(name),
        }
    }
}

/// Types with a known [`ValueKind`].
///
/// Optional fields report the kind of the wrapped type.
pub trait SqlKind {
    /// Kind of the type.
    const KIND: ValueKind;
}

macro_rules! sql_kind {
    ($($ty:ty => $kind:expr),* $(,)?) => {$(
        impl SqlKind for $ty {
            const KIND: ValueKind = $kind;
        }
    )*};
}

sql_kind! {
    bool => ValueKind::Bool,
    i8 => ValueKind::Int(1),
    i16 => ValueKind::Int(2),
    i32 => ValueKind::Int(4),
    i64 => ValueKind::Int(8),
    isize => ValueKind::Int(8),
    u8 => ValueKind::UInt(1),
    u16 => ValueKind::UInt(2),
    u32 => ValueKind::UInt(4),
    u64 => ValueKind::UInt(8),
    usize => ValueKind::UInt(8),
    f32 => ValueKind::Float,
    f64 => ValueKind::Float,
    String => ValueKind::Text,
    Vec<u8> => ValueKind::Blob,
    SqlValue => ValueKind::Unsupported("SqlValue"),
}

impl<T: SqlKind> SqlKind for Option<T> {
    const KIND: ValueKind = T::KIND;
}

/// One struct field as declared in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDeclaration {
    /// Field identifier in the struct.
    pub name: &'static str,
    /// Value kind of the field type.
    pub kind: ValueKind,
    /// Declarative tag, `None` when the field is not mapped.
    pub tag: Option<&'static str>,
}

impl FieldDeclaration {
    /// Creates a mapped field declaration.
    #[must_use]
    pub const fn new(name: &'static str, kind: ValueKind, tag: &'static str) -> Self {
        Self {
            name,
            kind,
            tag: Some(tag),
        }
    }

    /// Creates a declaration for a field that is not mapped to a column.
    #[must_use]
    pub const fn unmapped(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            tag: None,
        }
    }
}

/// A struct persisted as one table row.
pub trait Record: Sized + 'static {
    /// Local type name.
    const NAME: &'static str;

    /// Default SQL table name.
    const TABLE: &'static str;

    /// Every struct field, in source order.
    fn declarations() -> Vec<FieldDeclaration>;

    /// Value of the mapped field with the given local name.
    fn field_value(&self, field: &str) -> Option<SqlValue>;

    /// Rebuilds a value from decoded row fields keyed by local name.
    ///
    /// # Errors
    ///
    /// Returns an error if a mapped field is missing or does not decode.
    fn from_fields(fields: &mut FieldValues) -> Result<Self>;
}

/// Object-safe view of a row value, used by builders that accept rows.
pub trait RowValue {
    /// Type identity of the row.
    fn row_type(&self) -> TypeId;

    /// Type name of the row, for mismatch errors.
    fn row_type_name(&self) -> &'static str;

    /// Value of the field with the given local name.
    fn column_value(&self, field: &str) -> Option<SqlValue>;
}

impl<R: Record> RowValue for R {
    fn row_type(&self) -> TypeId {
        TypeId::of::<R>()
    }

    fn row_type_name(&self) -> &'static str {
        type_name::<R>()
    }

    fn column_value(&self, field: &str) -> Option<SqlValue> {
        self.field_value(field)
    }
}

/// Decoded column values of one row, keyed by local field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues {
    values: HashMap<String, SqlValue>,
}

impl FieldValues {
    /// Creates an empty set of values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the value of a field.
    pub fn insert(&mut self, field: impl Into<String>, value: SqlValue) {
        self.values.insert(field.into(), value);
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when no values are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Removes a field and decodes it as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::MissingField`] if the row has no such field and
    /// [`ShapeError::Decode`] if the stored value does not fit `T`.
    pub fn take<T: FromSqlValue>(&mut self, field: &str) -> Result<T> {
        let value = self
            .values
            .remove(field)
            .ok_or_else(|| ShapeError::MissingField(String::from(field)))?;
        T::from_sql_value(value).map_err(|found| ShapeError::Decode {
            field: String::from(field),
            expected: type_name::<T>(),
            found: String::from(found.kind_name()),
        })
    }
}

impl FromIterator<(String, SqlValue)> for FieldValues {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_inference() {
        assert_eq!(bool::KIND.sql_type().as_deref(), Some("INTEGER(1)"));
        assert_eq!(u16::KIND.sql_type().as_deref(), Some("INTEGER(2)"));
        assert_eq!(i32::KIND.sql_type().as_deref(), Some("INTEGER(4)"));
        assert_eq!(usize::KIND.sql_type().as_deref(), Some("INTEGER(8)"));
        assert_eq!(f32::KIND.sql_type().as_deref(), Some("REAL"));
        assert_eq!(String::KIND.sql_type().as_deref(), Some("TEXT(4096)"));
        assert_eq!(Vec::<u8>::KIND.sql_type(), None);
    }

    #[test]
    fn test_option_uses_wrapped_kind() {
        assert_eq!(<Option<i64>>::KIND, ValueKind::Int(8));
        assert_eq!(<Option<String>>::KIND, ValueKind::Text);
    }

    #[test]
    fn test_take_missing_field() {
        let mut values = FieldValues::new();
        assert_eq!(
            values.take::<i64>("id"),
            Err(ShapeError::MissingField(String::from("id")))
        );
    }

    #[test]
    fn test_take_decode_error() {
        let mut values = FieldValues::new();
        values.insert("id", SqlValue::Text(String::from("one")));
        let err = values.take::<i64>("id").unwrap_err();
        assert!(matches!(err, ShapeError::Decode { ref field, .. } if field == "id"));
    }

    #[test]
    fn test_take_removes_value() {
        let mut values: FieldValues = vec![(String::from("name"), SqlValue::Text(String::from("Ada")))]
            .into_iter()
            .collect();
        assert_eq!(values.take::<String>("name"), Ok(String::from("Ada")));
        assert!(values.is_empty());
    }
}
