//! Scheme records kept in a table of the same database.

use std::sync::Arc;

use oxide_shape_core::builder::{Create, Delete, Replace, Select};
use oxide_shape_core::{Record, TableDescriptor};
use oxide_shape_derive::Record;
use tracing::debug;

use super::record::SchemeRecord;
use super::store::SchemeStore;
use crate::error::Result;
use crate::transport::Transport;

#[derive(Debug, Clone, Record)]
struct StoredScheme {
    #[sql("NAME=local_table_name,PRIMARY_KEY,NOT_NULL")]
    key: String,
    #[sql("NAME=remote_table_name,NOT_NULL")]
    remote_name: String,
    #[sql("NAME=local_type_name")]
    local_name: String,
    #[sql("NAME=scheme_version,NOT_NULL")]
    version: i64,
    #[sql("NAME=scheme_hash,NOT_NULL")]
    hash: String,
    #[sql("NAME=scheme_fields,TYPE=TEXT,NOT_NULL")]
    fields: String,
}

impl StoredScheme {
    fn new(key: &str, record: &SchemeRecord) -> Result<Self> {
        Ok(Self {
            key: key.to_string(),
            remote_name: record.remote_name.clone(),
            local_name: record.local_name.clone(),
            version: record.scheme_version,
            hash: record.hash.clone(),
            fields: serde_json::to_string(&record.fields)?,
        })
    }

    fn into_record(self) -> Result<(String, SchemeRecord)> {
        let record = SchemeRecord {
            scheme_version: self.version,
            local_name: self.local_name,
            remote_name: self.remote_name,
            fields: serde_json::from_str(&self.fields)?,
            hash: self.hash,
        };
        Ok((self.key, record))
    }
}

/// Records kept as rows of a scheme table.
///
/// Writes go through the shared transport, so a write made while a
/// migration holds the connection joins its transaction.
#[derive(Debug)]
pub struct TableStore {
    transport: Arc<Transport>,
    table: TableDescriptor,
}

impl TableStore {
    /// Opens the store, creating the scheme table `name` if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be created.
    pub fn new(transport: Arc<Transport>, name: &str) -> Result<Self> {
        let table = TableDescriptor::build::<StoredScheme>(name)?;
        transport.lock().execute(&Create::new().table(&table))?;
        debug!(table = %name, "Scheme table ready");
        Ok(Self { transport, table })
    }

    fn key_column(&self) -> Result<&str> {
        let field = self.table.field_by_local("key").ok_or_else(|| {
            oxide_shape_core::ShapeError::MissingKey(StoredScheme::NAME.to_string())
        })?;
        Ok(&field.remote_name)
    }
}

impl SchemeStore for TableStore {
    fn load(&self) -> Result<Vec<(String, SchemeRecord)>> {
        let rows = self
            .transport
            .lock()
            .query(&Select::new().table(&self.table))?;
        rows.into_iter()
            .map(|row| row.decode::<StoredScheme>(&self.table)?.into_record())
            .collect()
    }

    fn get(&self, key: &str) -> Result<Option<SchemeRecord>> {
        let select = Select::new()
            .table(&self.table)
            .filter(self.key_column()?, key);
        let rows = self.transport.lock().query(&select)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.decode::<StoredScheme>(&self.table)?.into_record()?.1)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, record: &SchemeRecord) -> Result<()> {
        let row = StoredScheme::new(key, record)?;
        self.transport
            .lock()
            .execute(&Replace::new().table(&self.table).value(&row))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let delete = Delete::new()
            .table(&self.table)
            .filter(self.key_column()?, key);
        self.transport.lock().execute(&delete)?;
        Ok(())
    }
}
