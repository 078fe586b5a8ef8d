//! Field descriptors parsed from declarative tags.
//!
//! A tag is a list of `KEY=VALUE` or bare-flag tokens. Tokens are separated
//! by `|` when the tag contains one, otherwise by `,`; use the pipe form
//! when a `DEFAULT` or `CHECK` expression contains commas.
//!
//! | token | effect |
//! |-------|--------|
//! | `NAME=<name>` | column name (defaults to the field name) |
//! | `TYPE=<sql type>` | column type (defaults to one inferred from the value kind) |
//! | `PRIMARY_KEY` | part of the primary key |
//! | `AUTO_INCREMENT` | auto-increment column |
//! | `NOT_NULL` | `NOT NULL` column |
//! | `UNIQUE` | singleton unique constraint |
//! | `UNIQUE_GROUP=<name>` | member of a composite unique constraint |
//! | `DEFAULT=<expr>` | column default |
//! | `CHECK=<expr>` | check constraint |
//!
//! Keys are case-insensitive. Unknown tokens are ignored.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Result, ShapeError};
use crate::record::FieldDeclaration;

/// Normalized description of one mapped column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field identifier in the source type.
    pub local_name: String,
    /// Column name.
    pub remote_name: String,
    /// SQL type token.
    pub remote_type: String,
    /// Part of the primary key.
    #[serde(default)]
    pub is_primary_key: bool,
    /// Auto-increment column.
    #[serde(default)]
    pub is_auto_increment: bool,
    /// `NOT NULL` column.
    #[serde(default)]
    pub is_not_null: bool,
    /// Unique constraint group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_group: Option<String>,
    /// Column default expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Check constraint expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_expression: Option<String>,
    /// Position among the mapped columns of the table.
    pub ordinal: usize,
}

impl FieldDescriptor {
    /// Parses a field declaration.
    ///
    /// Returns `Ok(None)` for a field without a tag: it is not mapped.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::UnsupportedKind`] if no `TYPE` is given and the
    /// value kind has no inferred SQL type.
    pub fn parse(declaration: &FieldDeclaration, ordinal: usize) -> Result<Option<Self>> {
        let Some(tag) = declaration.tag else {
            return Ok(None);
        };

        let mut field = Self {
            local_name: String::from(declaration.name),
            remote_name: String::from(declaration.name),
            remote_type: String::new(),
            is_primary_key: false,
            is_auto_increment: false,
            is_not_null: false,
            unique_group: None,
            default_value: None,
            check_expression: None,
            ordinal,
        };
        let mut explicit_type = None;
        let mut unique = false;

        for (key, value) in tokens(tag) {
            match (key.as_str(), value) {
                ("NAME", Some(name)) if !name.is_empty() => field.remote_name = String::from(name),
                ("TYPE", Some(sql_type)) if !sql_type.is_empty() => {
                    explicit_type = Some(String::from(sql_type));
                }
                ("PRIMARY_KEY", None) => field.is_primary_key = true,
                ("AUTO_INCREMENT", None) => field.is_auto_increment = true,
                ("NOT_NULL", None) => field.is_not_null = true,
                ("UNIQUE", None) => unique = true,
                ("UNIQUE_GROUP", Some(group)) if !group.is_empty() => {
                    field.unique_group = Some(String::from(group));
                }
                ("DEFAULT", Some(expr)) => field.default_value = Some(String::from(expr)),
                ("CHECK", Some(expr)) => field.check_expression = Some(String::from(expr)),
                _ => trace!(
                    field = declaration.name,
                    token = %key,
                    "Ignoring unknown tag token"
                ),
            }
        }

        if unique && field.unique_group.is_none() {
            field.unique_group = Some(field.remote_name.clone());
        }

        field.remote_type = match explicit_type.or_else(|| declaration.kind.sql_type()) {
            Some(sql_type) => sql_type,
            None => {
                return Err(ShapeError::UnsupportedKind {
                    field: String::from(declaration.name),
                    kind: declaration.kind.describe(),
                })
            }
        };

        Ok(Some(field))
    }
}

/// Splits a tag into upper-cased keys and optional trimmed values.
fn tokens(tag: &str) -> impl Iterator<Item = (String, Option<&str>)> {
    let separator = if tag.contains('|') { '|' } else { ',' };
    tag.split(separator)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| match token.split_once('=') {
            Some((key, value)) => (key.trim().to_ascii_uppercase(), Some(value.trim())),
            None => (token.to_ascii_uppercase(), None),
        })
}
