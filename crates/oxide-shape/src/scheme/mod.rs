//! Shape tracking and migration of registered tables.
//!
//! Every registered table has a [`SchemeRecord`]: the shape last applied to
//! the database, with its version and hash. Registering a type compares the
//! declared shape with that record and picks a [`Plan`]:
//!
//! | stored record | hash | declared version | plan |
//! |---------------|------|------------------|------|
//! | none | - | - | [`Plan::Create`] |
//! | some | equal | higher | [`Plan::Bump`] |
//! | some | equal | same or lower | [`Plan::Stable`] |
//! | some | differs | lower | outdated version error |
//! | some | differs | same | ambiguous version error |
//! | some | differs | higher | [`Plan::Migrate`] |
//!
//! A migration copies the matched columns into a shadow table built with the
//! new shape, drops the old table and renames the shadow into place. All
//! statements and the record update run in one transaction.

mod matcher;
mod record;
mod store;
mod table_store;

pub use matcher::{FieldMatcher, FieldPair, RenameTolerant};
pub use record::SchemeRecord;
pub use store::{JsonFileStore, MemoryStore, SchemeStore};
pub use table_store::TableStore;

use std::any::TypeId;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use oxide_shape_core::builder::{CopyRows, Create, DropTable, RenameTable};
use oxide_shape_core::{Record, TableDescriptor};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{DatabaseError, Result};
use crate::transport::{Session, Transport};

/// What registering a declared shape does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// No stored record: create the table.
    Create,
    /// Same shape: nothing to do.
    Stable,
    /// Same shape under a higher version: store the new version only.
    Bump,
    /// New shape under a higher version: migrate the table.
    Migrate,
}

/// Decides what registering `local` over `remote` does.
///
/// # Errors
///
/// - [`DatabaseError::OutdatedVersion`] if the shapes differ and `local`
///   declares a lower version
/// - [`DatabaseError::AmbiguousVersion`] if the shapes differ under the same
///   version
pub fn plan(remote: Option<&SchemeRecord>, local: &SchemeRecord) -> Result<Plan> {
    let Some(remote) = remote else {
        return Ok(Plan::Create);
    };
    if remote.hash == local.hash {
        return Ok(if local.scheme_version > remote.scheme_version {
            Plan::Bump
        } else {
            Plan::Stable
        });
    }
    match local.scheme_version.cmp(&remote.scheme_version) {
        Ordering::Less => Err(DatabaseError::OutdatedVersion {
            table: remote.remote_name.clone(),
            local: local.scheme_version,
            remote: remote.scheme_version,
        }),
        Ordering::Equal => Err(DatabaseError::AmbiguousVersion {
            table: remote.remote_name.clone(),
            version: local.scheme_version,
        }),
        Ordering::Greater => Ok(Plan::Migrate),
    }
}

#[derive(Default)]
struct SchemeState {
    remote: HashMap<String, SchemeRecord>,
    pending: HashSet<String>,
    tables: HashMap<TypeId, Arc<TableDescriptor>>,
}

/// A registration in flight; the name is released when dropped.
struct Pending<'e> {
    state: &'e Mutex<SchemeState>,
    name: &'e str,
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.state.lock().pending.remove(self.name);
    }
}

/// Registers tables and keeps them at their declared shape.
///
/// The engine holds two locks: the transport's connection lock for every
/// statement, and its own metadata lock for the record maps. The metadata
/// lock is only taken for map updates, never across a statement.
pub struct SchemeEngine {
    transport: Arc<Transport>,
    store: Box<dyn SchemeStore>,
    version: i64,
    state: Mutex<SchemeState>,
}

impl std::fmt::Debug for SchemeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemeEngine")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl SchemeEngine {
    /// Creates an engine loaded from `store`.
    ///
    /// `version` is the scheme version used by [`SchemeEngine::register`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn new(
        transport: Arc<Transport>,
        store: Box<dyn SchemeStore>,
        version: i64,
    ) -> Result<Self> {
        let remote: HashMap<String, SchemeRecord> = store.load()?.into_iter().collect();
        info!(tables = remote.len(), version, "Scheme loaded");
        Ok(Self {
            transport,
            store,
            version,
            state: Mutex::new(SchemeState {
                remote,
                ..SchemeState::default()
            }),
        })
    }

    /// Returns the default scheme version.
    #[must_use]
    pub const fn version(&self) -> i64 {
        self.version
    }

    /// Returns the transport statements run on.
    #[must_use]
    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Registers `T` under its default table name and the default version.
    ///
    /// # Errors
    ///
    /// See [`SchemeEngine::register_with`].
    pub fn register<T: Record>(&self) -> Result<Arc<TableDescriptor>> {
        self.register_with::<T>(T::TABLE, self.version, &RenameTolerant)
    }

    /// Registers `T` as table `name` at `version`.
    ///
    /// # Errors
    ///
    /// See [`SchemeEngine::register_with`].
    pub fn register_as<T: Record>(&self, name: &str, version: i64) -> Result<Arc<TableDescriptor>> {
        self.register_with::<T>(name, version, &RenameTolerant)
    }

    /// Registers `T` as table `name` at `version`, pairing columns with
    /// `matcher` if a migration is needed.
    ///
    /// # Errors
    ///
    /// - descriptor errors for an invalid `T`
    /// - [`DatabaseError::RegistrationPending`] if `name` is being registered
    /// - the version errors of [`plan`]
    /// - [`DatabaseError::MigrationUnsupported`] if no column survives
    /// - driver and store errors; the transaction is rolled back and the
    ///   stored record is left as it was
    pub fn register_with<T: Record>(
        &self,
        name: &str,
        version: i64,
        matcher: &dyn FieldMatcher,
    ) -> Result<Arc<TableDescriptor>> {
        let table = Arc::new(TableDescriptor::build::<T>(name)?);
        let local = SchemeRecord::from_table(&table, version);
        let session = self.transport.lock();

        let (plan, remote) = {
            let mut state = self.state.lock();
            if state.pending.contains(name) {
                return Err(DatabaseError::RegistrationPending(name.to_string()));
            }
            let remote = state.remote.get(name).cloned();
            let plan = plan(remote.as_ref(), &local)?;
            state.pending.insert(name.to_string());
            (plan, remote)
        };
        let pending = Pending {
            state: &self.state,
            name,
        };

        let outcome = match plan {
            Plan::Stable => Ok(()),
            _ => session.transaction(|s| {
                self.apply(s, plan, &table, remote.as_ref(), &local, matcher)?;
                self.store.put(name, &local)
            }),
        };
        drop(pending);
        outcome?;

        let mut state = self.state.lock();
        if plan != Plan::Stable {
            state.remote.insert(name.to_string(), local);
        }
        state.tables.insert(TypeId::of::<T>(), Arc::clone(&table));
        info!(table = %name, ?plan, version, "Table registered");
        Ok(table)
    }

    fn apply(
        &self,
        session: &Session<'_>,
        plan: Plan,
        table: &TableDescriptor,
        remote: Option<&SchemeRecord>,
        local: &SchemeRecord,
        matcher: &dyn FieldMatcher,
    ) -> Result<()> {
        let name = table.remote_name();
        match (plan, remote) {
            (Plan::Create, _) => {
                info!(table = %name, version = local.scheme_version, "Creating table");
                session.execute(&Create::new().table(table))?;
            }
            (Plan::Bump, Some(remote)) => {
                info!(
                    table = %name,
                    from = remote.scheme_version,
                    to = local.scheme_version,
                    "Raising scheme version"
                );
            }
            (Plan::Migrate, Some(remote)) => self.migrate(session, table, remote, local, matcher)?,
            _ => {}
        }
        Ok(())
    }

    fn migrate(
        &self,
        session: &Session<'_>,
        table: &TableDescriptor,
        remote: &SchemeRecord,
        local: &SchemeRecord,
        matcher: &dyn FieldMatcher,
    ) -> Result<()> {
        let name = table.remote_name();
        let pairs = matcher.match_fields(remote, local);
        if pairs.is_empty() {
            warn!(table = %name, "No column survives, migration refused");
            return Err(DatabaseError::MigrationUnsupported(name.to_string()));
        }
        info!(
            table = %name,
            from = remote.scheme_version,
            to = local.scheme_version,
            columns = pairs.len(),
            "Migrating table"
        );

        let shadow = format!("_{name}_migration");
        session.execute(&DropTable::new().name(shadow.as_str()).if_exists())?;
        session.execute(
            &Create::new()
                .table(table)
                .name(&shadow)
                .if_not_exists(false),
        )?;
        session.execute(
            &CopyRows::new()
                .from_table(remote.remote_name.as_str())
                .into_table(shadow.as_str())
                .pairs(pairs.iter().map(|p| (p.old.as_str(), p.new.as_str()))),
        )?;
        session.execute(&DropTable::new().name(remote.remote_name.as_str()))?;
        session.execute(&RenameTable::new().name(shadow.as_str()).to(name))?;
        Ok(())
    }

    /// Returns whether table `name` has a stored record.
    #[must_use]
    pub fn check_exists(&self, name: &str) -> bool {
        self.state.lock().remote.contains_key(name)
    }

    /// Returns whether table `name` is stored with the shape of `table`.
    #[must_use]
    pub fn check_hash(&self, name: &str, table: &TableDescriptor) -> bool {
        self.state
            .lock()
            .remote
            .get(name)
            .is_some_and(|r| r.hash == table.hash())
    }

    /// Returns the stored record of table `name`.
    #[must_use]
    pub fn remote_record(&self, name: &str) -> Option<SchemeRecord> {
        self.state.lock().remote.get(name).cloned()
    }

    /// Returns the names of all stored tables, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().remote.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the descriptor `T` was registered with.
    ///
    /// # Errors
    ///
    /// - [`DatabaseError::TableNotExists`] if `T` was never registered or
    ///   its table was dropped
    /// - [`DatabaseError::TableNotMigrated`] if the stored shape differs
    pub fn table_for<T: Record>(&self) -> Result<Arc<TableDescriptor>> {
        let state = self.state.lock();
        let table = state
            .tables
            .get(&TypeId::of::<T>())
            .ok_or_else(|| DatabaseError::TableNotExists(T::TABLE.to_string()))?;
        let name = table.remote_name();
        let remote = state
            .remote
            .get(name)
            .ok_or_else(|| DatabaseError::TableNotExists(name.to_string()))?;
        if remote.hash != table.hash() {
            return Err(DatabaseError::TableNotMigrated(name.to_string()));
        }
        Ok(Arc::clone(table))
    }

    /// Drops table `name` and forgets its record.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::TableNotExists`] if `name` has no record, or
    /// driver and store errors.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let session = self.transport.lock();
        if !self.check_exists(name) {
            return Err(DatabaseError::TableNotExists(name.to_string()));
        }
        session.transaction(|s| {
            s.execute(&DropTable::new().name(name).if_exists())?;
            self.store.delete(name)
        })?;

        let mut state = self.state.lock();
        state.remote.remove(name);
        state.tables.retain(|_, t| t.remote_name() != name);
        info!(table = %name, "Table dropped");
        Ok(())
    }
}
