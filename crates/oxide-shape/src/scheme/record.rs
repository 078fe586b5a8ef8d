//! Applied table shapes.

use std::collections::BTreeMap;

use oxide_shape_core::{shape_hash, FieldDescriptor, TableDescriptor};
use serde::{Deserialize, Serialize};

/// The stored shape of one table at one scheme version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeRecord {
    /// Version declared when the shape was applied.
    pub scheme_version: i64,
    /// Name of the source type.
    pub local_name: String,
    /// Table name.
    pub remote_name: String,
    /// Field snapshots keyed by column name.
    pub fields: BTreeMap<String, FieldDescriptor>,
    /// Shape hash of the fields.
    pub hash: String,
}

impl SchemeRecord {
    /// Snapshots a table descriptor at `version`.
    #[must_use]
    pub fn from_table(table: &TableDescriptor, version: i64) -> Self {
        Self {
            scheme_version: version,
            local_name: table.local_name().to_string(),
            remote_name: table.remote_name().to_string(),
            fields: table
                .fields()
                .iter()
                .map(|f| (f.remote_name.clone(), f.clone()))
                .collect(),
            hash: table.hash(),
        }
    }

    /// Returns the fields in declaration order.
    #[must_use]
    pub fn ordered_fields(&self) -> Vec<&FieldDescriptor> {
        let mut fields: Vec<&FieldDescriptor> = self.fields.values().collect();
        fields.sort_by_key(|f| f.ordinal);
        fields
    }

    /// Recomputes the hash from the field snapshots.
    #[must_use]
    pub fn compute_hash(&self) -> String {
        shape_hash(self.ordered_fields())
    }
}

#[cfg(test)]
mod tests {
    use oxide_shape_core::{FieldDeclaration, ValueKind};

    use super::*;

    struct Marker;

    fn table() -> TableDescriptor {
        TableDescriptor::from_declarations(
            "Person",
            "person",
            std::any::TypeId::of::<Marker>(),
            "Marker",
            &[
                FieldDeclaration::new("name", ValueKind::Text, "NAME=Name"),
                FieldDeclaration::new("id", ValueKind::Int(8), "NAME=ID,PRIMARY_KEY"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_table() {
        let record = SchemeRecord::from_table(&table(), 3);
        assert_eq!(record.scheme_version, 3);
        assert_eq!(record.local_name, "Person");
        assert_eq!(record.remote_name, "person");
        assert_eq!(record.fields.len(), 2);
        assert_eq!(record.hash, table().hash());
    }

    #[test]
    fn test_ordered_fields_follow_declaration() {
        let record = SchemeRecord::from_table(&table(), 1);
        let names: Vec<&str> = record
            .ordered_fields()
            .iter()
            .map(|f| f.remote_name.as_str())
            .collect();
        assert_eq!(names, vec!["Name", "ID"]);
    }

    #[test]
    fn test_hash_survives_json() {
        let record = SchemeRecord::from_table(&table(), 1);
        let json = serde_json::to_string(&record).unwrap();
        let back: SchemeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.compute_hash(), record.hash);
    }
}
