//! Table descriptors built from a [`Record`] type.

use std::any::{type_name, TypeId};
use std::collections::{BTreeMap, HashMap};

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{Result, ShapeError};
use crate::field::FieldDescriptor;
use crate::record::{FieldDeclaration, Record};

/// The shape of one table, derived from a source type.
///
/// Fields are kept in declaration order and indexed by both remote and local
/// name. At most one field carries the auto-increment flag, and only when it
/// is the sole primary key.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    local_name: String,
    remote_name: String,
    type_id: TypeId,
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
    by_remote: HashMap<String, usize>,
    by_local: HashMap<String, usize>,
    primary_key: Vec<usize>,
    auto_increment: Option<usize>,
    unique_groups: BTreeMap<String, Vec<usize>>,
}

impl TableDescriptor {
    /// Builds the descriptor of `R` stored in the table `sql_name`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a field kind is unsupported, two
    /// fields share a column name, no field is mapped or the name is empty.
    pub fn build<R: Record>(sql_name: &str) -> Result<Self> {
        Self::from_declarations(
            R::NAME,
            sql_name,
            TypeId::of::<R>(),
            type_name::<R>(),
            &R::declarations(),
        )
    }

    /// Builds a descriptor from raw field declarations.
    ///
    /// # Errors
    ///
    /// See [`TableDescriptor::build`].
    pub fn from_declarations(
        local_name: &str,
        sql_name: &str,
        type_id: TypeId,
        type_name: &'static str,
        declarations: &[FieldDeclaration],
    ) -> Result<Self> {
        if sql_name.is_empty() {
            return Err(ShapeError::EmptyTableName(String::from(local_name)));
        }

        let mut table = Self {
            local_name: String::from(local_name),
            remote_name: String::from(sql_name),
            type_id,
            type_name,
            fields: Vec::new(),
            by_remote: HashMap::new(),
            by_local: HashMap::new(),
            primary_key: Vec::new(),
            auto_increment: None,
            unique_groups: BTreeMap::new(),
        };

        for declaration in declarations {
            let Some(mut field) = FieldDescriptor::parse(declaration, table.fields.len())? else {
                continue;
            };
            if table.by_remote.contains_key(&field.remote_name) {
                return Err(ShapeError::DuplicateColumn {
                    table: String::from(local_name),
                    column: field.remote_name,
                });
            }

            let index = table.fields.len();
            if field.is_auto_increment {
                if table.auto_increment.is_some() {
                    warn!(
                        table = local_name,
                        field = %field.local_name,
                        "Clearing AUTO_INCREMENT on a second candidate"
                    );
                    field.is_auto_increment = false;
                } else {
                    table.auto_increment = Some(index);
                }
            }
            if field.is_primary_key {
                table.primary_key.push(index);
            }
            if let Some(group) = &field.unique_group {
                table.unique_groups.entry(group.clone()).or_default().push(index);
            }

            table.by_remote.insert(field.remote_name.clone(), index);
            table.by_local.insert(field.local_name.clone(), index);
            table.fields.push(field);
        }

        if table.fields.is_empty() {
            return Err(ShapeError::NoFields(String::from(local_name)));
        }

        if let Some(index) = table.auto_increment {
            if table.primary_key != [index] {
                warn!(
                    table = local_name,
                    field = %table.fields[index].local_name,
                    "Clearing AUTO_INCREMENT on a field that is not the sole primary key"
                );
                table.fields[index].is_auto_increment = false;
                table.auto_increment = None;
            }
        }

        Ok(table)
    }

    /// Local type name.
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// SQL table name.
    #[must_use]
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    /// Type identity of the source type.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Full Rust name of the source type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Mapped fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by column name.
    #[must_use]
    pub fn field(&self, remote_name: &str) -> Option<&FieldDescriptor> {
        self.by_remote.get(remote_name).map(|&i| &self.fields[i])
    }

    /// Looks up a field by its name in the source type.
    #[must_use]
    pub fn field_by_local(&self, local_name: &str) -> Option<&FieldDescriptor> {
        self.by_local.get(local_name).map(|&i| &self.fields[i])
    }

    /// Primary key fields in declaration order.
    pub fn primary_key(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.primary_key.iter().map(|&i| &self.fields[i])
    }

    /// The auto-increment field, if any.
    #[must_use]
    pub fn auto_increment(&self) -> Option<&FieldDescriptor> {
        self.auto_increment.map(|i| &self.fields[i])
    }

    /// Unique constraint groups, ordered by group name.
    pub fn unique_groups(&self) -> impl Iterator<Item = (&str, Vec<&FieldDescriptor>)> {
        self.unique_groups.iter().map(|(name, members)| {
            (
                name.as_str(),
                members.iter().map(|&i| &self.fields[i]).collect(),
            )
        })
    }

    /// Fields that identify a row: the auto-increment field, else the
    /// primary key. Empty when the table has neither.
    #[must_use]
    pub fn key_fields(&self) -> Vec<&FieldDescriptor> {
        self.auto_increment()
            .map_or_else(|| self.primary_key().collect(), |field| vec![field])
    }

    /// Content hash of the table shape.
    #[must_use]
    pub fn hash(&self) -> String {
        shape_hash(self.fields.iter())
    }
}

/// Hashes an ordered field list into a hex SHA-256 digest.
///
/// Every field contributes its column name, type, flags, default, check and
/// unique group, each length-prefixed so that no two shapes share an
/// encoding. Ordinals and local names do not contribute.
pub fn shape_hash<'a>(fields: impl IntoIterator<Item = &'a FieldDescriptor>) -> String {
    let mut hasher = Sha256::new();
    for field in fields {
        feed(&mut hasher, Some(&field.remote_name));
        feed(&mut hasher, Some(&field.remote_type));
        hasher.update([
            u8::from(field.is_primary_key),
            u8::from(field.is_auto_increment),
            u8::from(field.is_not_null),
        ]);
        feed(&mut hasher, field.default_value.as_deref());
        feed(&mut hasher, field.check_expression.as_deref());
        feed(&mut hasher, field.unique_group.as_deref());
    }
    format!("{:x}", hasher.finalize())
}

fn feed(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        None => hasher.update([0]),
        Some(value) => {
            hasher.update([1]);
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
    }
}
