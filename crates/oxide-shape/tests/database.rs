//! Typed CRUD through the `Database` facade.

use std::sync::Arc;

use oxide_shape::prelude::*;
use oxide_shape::{JsonFileStore, MemoryStore, SqliteDriver, Transport};

#[derive(Debug, Clone, PartialEq, Record)]
#[record(name = "account")]
pub struct Account {
    #[sql("NAME=ID,PRIMARY_KEY,AUTO_INCREMENT")]
    pub id: i64,
    #[sql("NAME=Login,NOT_NULL,UNIQUE")]
    pub login: String,
    #[sql("NAME=Age|CHECK=Age >= 0")]
    pub age: i32,
    #[sql("NAME=Nickname")]
    pub nickname: Option<String>,
    pub session: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Record)]
#[record(name = "setting")]
pub struct Setting {
    #[sql("NAME=Key,PRIMARY_KEY")]
    pub key: String,
    #[sql("NAME=Value")]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Record)]
#[record(name = "ticket")]
pub struct Ticket {
    #[sql("NAME=ID,PRIMARY_KEY,AUTO_INCREMENT")]
    pub id: i64,
}

fn account(login: &str, age: i32) -> Account {
    Account {
        id: 0,
        login: login.to_string(),
        age,
        nickname: None,
        session: vec![1, 2, 3],
    }
}

fn memory_database() -> Database {
    let config = ShapeConfig {
        url: String::from("sqlite::memory:"),
        ..ShapeConfig::default()
    };
    let db = Database::open(&config).unwrap();
    db.register::<Account>().unwrap();
    db.register::<Setting>().unwrap();
    db
}

// =============================================================================
// Test: Insert and select
// =============================================================================

#[test]
fn test_insert_returns_id() {
    let db = memory_database();
    assert_eq!(db.insert(&account("ada", 36)).unwrap(), 1);
    assert_eq!(db.insert(&account("grace", 85)).unwrap(), 2);
    assert_eq!(db.count::<Account>().unwrap(), 2);
    assert_eq!(db.last_id::<Account>().unwrap(), 2);
}

#[test]
fn test_select_decodes_rows() {
    let db = memory_database();
    let id = db.insert(&account("ada", 36)).unwrap();

    let ada: Account = db.select_by_id(id).unwrap();
    assert_eq!(
        ada,
        Account {
            id,
            session: vec![],
            ..account("ada", 36)
        }
    );
    assert_eq!(ada.nickname, None);
}

#[test]
fn test_query_with_filters() {
    let db = memory_database();
    db.insert_all(&[account("ada", 36), account("grace", 85), account("alan", 41)])
        .unwrap();

    let older: Vec<Account> = db
        .query(|select| {
            select
                .filter_raw("Age > ?", [SqlValue::Int(40)])
                .order_by("Login", Order::Asc)
        })
        .unwrap();
    let logins: Vec<&str> = older.iter().map(|a| a.login.as_str()).collect();
    assert_eq!(logins, vec!["alan", "grace"]);

    let page: Vec<Account> = db
        .query(|select| select.order_by("ID", Order::Desc).limit(1))
        .unwrap();
    assert_eq!(page[0].login, "alan");

    let ada: Vec<Account> = db.select_where("Login", "ada").unwrap();
    assert_eq!(ada.len(), 1);
}

#[test]
fn test_select_single_counts_rows() {
    let db = memory_database();
    db.insert_all(&[account("ada", 36), account("grace", 36)])
        .unwrap();

    assert!(matches!(
        db.select_single::<Account>("Login", "alan"),
        Err(DatabaseError::LessThanRequested)
    ));
    assert!(matches!(
        db.select_single::<Account>("Age", 36),
        Err(DatabaseError::MoreThanRequested)
    ));
    assert_eq!(
        db.select_single::<Account>("Login", "grace").unwrap().id,
        2
    );
}

#[test]
fn test_empty_table() {
    let db = memory_database();
    assert_eq!(db.count::<Account>().unwrap(), 0);
    assert_eq!(db.last_id::<Account>().unwrap(), 0);
    assert!(db.select_all::<Account>().unwrap().is_empty());
    assert_eq!(db.insert_all::<Account>(&[]).unwrap(), 0);
}

#[test]
fn test_insert_key_only_rows() {
    let db = memory_database();
    db.register::<Ticket>().unwrap();

    let tickets = vec![Ticket { id: 0 }; 3];
    assert_eq!(db.insert_all(&tickets).unwrap(), 3);
    assert_eq!(db.insert(&Ticket { id: 0 }).unwrap(), 4);
    assert_eq!(db.count::<Ticket>().unwrap(), 4);
}

// =============================================================================
// Test: Update, replace and delete
// =============================================================================

#[test]
fn test_update_by_key() {
    let db = memory_database();
    let id = db.insert(&account("ada", 36)).unwrap();

    let mut ada: Account = db.select_by_id(id).unwrap();
    ada.nickname = Some(String::from("Countess"));
    db.update(&ada).unwrap();
    assert_eq!(
        db.select_by_id::<Account>(id).unwrap().nickname.as_deref(),
        Some("Countess")
    );

    let ghost = Account {
        id: 99,
        ..account("ghost", 1)
    };
    assert!(matches!(db.update(&ghost), Err(DatabaseError::NotUpdated(_))));
}

#[test]
fn test_delete_by_key() {
    let db = memory_database();
    let id = db.insert(&account("ada", 36)).unwrap();
    let ada: Account = db.select_by_id(id).unwrap();

    db.delete(&ada).unwrap();
    assert_eq!(db.count::<Account>().unwrap(), 0);
    assert!(matches!(db.delete(&ada), Err(DatabaseError::NotDeleted(_))));
}

#[test]
fn test_replace_without_auto_increment() {
    let db = memory_database();
    let setting = Setting {
        key: String::from("theme"),
        value: String::from("dark"),
    };
    db.replace(&setting).unwrap();
    db.replace(&Setting {
        value: String::from("light"),
        ..setting.clone()
    })
    .unwrap();

    let all: Vec<Setting> = db.select_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].value, "light");
    assert!(matches!(
        db.select_by_id::<Setting>(1),
        Err(DatabaseError::Shape(ShapeError::MissingKey(_)))
    ));
}

#[test]
fn test_constraints_surface_as_driver_errors() {
    let db = memory_database();
    db.insert(&account("ada", 36)).unwrap();

    assert!(matches!(
        db.insert(&account("ada", 20)),
        Err(DatabaseError::Driver(_))
    ));
    assert!(matches!(
        db.insert(&account("bob", -1)),
        Err(DatabaseError::Driver(_))
    ));
}

#[test]
fn test_insert_all_is_atomic() {
    let db = memory_database();
    let err = db
        .insert_all(&[account("ada", 36), account("ada", 37)])
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Driver(_)));
    assert_eq!(db.count::<Account>().unwrap(), 0);
}

// =============================================================================
// Test: Unregistered types and escape hatches
// =============================================================================

#[derive(Debug, Clone, Record)]
pub struct Unregistered {
    #[sql("NAME=ID,PRIMARY_KEY,AUTO_INCREMENT")]
    pub id: i64,
}

#[test]
fn test_unregistered_type_is_refused() {
    let db = memory_database();
    assert!(matches!(
        db.insert(&Unregistered { id: 0 }),
        Err(DatabaseError::TableNotExists(_))
    ));
}

#[test]
fn test_exec_rolls_back_on_error() {
    let db = memory_database();
    let err = db
        .exec_with_table::<Account, (), _>(|session, table| {
            session.execute(&Insert::new().table(table).value(&account("ada", 36)))?;
            Err(DatabaseError::NotInserted(table.remote_name().to_string()))
        })
        .unwrap_err();
    assert!(matches!(err, DatabaseError::NotInserted(_)));
    assert_eq!(db.count::<Account>().unwrap(), 0);

    let status = db
        .exec(|session| {
            let table = db.engine().table_for::<Account>()?;
            session.execute(&Insert::new().table(&table).value(&account("ada", 36)))?;
            session.execute(&Insert::new().table(&table).value(&account("grace", 85)))?;
            Ok(session.status())
        })
        .unwrap();
    assert_eq!(status.rows_affected, 2);
    assert_eq!(status.last_insert_id, 2);
}

#[test]
fn test_nested_calls_share_the_transaction() {
    let db = memory_database();
    let err = db
        .exec(|_| {
            db.insert(&account("ada", 36))?;
            Err::<(), _>(DatabaseError::Cancelled)
        })
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Cancelled));
    assert_eq!(db.count::<Account>().unwrap(), 0);
}

// =============================================================================
// Test: Configuration and persistence
// =============================================================================

#[test]
fn test_unsupported_driver() {
    let config = ShapeConfig {
        driver: String::from("mysql"),
        ..ShapeConfig::default()
    };
    assert!(matches!(
        Database::open(&config),
        Err(DatabaseError::Config(_))
    ));
}

#[test]
fn test_close_twice() {
    let db = memory_database();
    db.close().unwrap();
    assert!(matches!(db.close(), Err(DatabaseError::AlreadyClosed)));
    assert!(matches!(
        db.count::<Account>(),
        Err(DatabaseError::AlreadyClosed)
    ));
}

#[test]
fn test_file_database_reopens_with_scheme_table() {
    let dir = tempfile::tempdir().unwrap();
    let config = ShapeConfig {
        url: format!("sqlite://{}", dir.path().join("app.db").display()),
        ..ShapeConfig::default()
    };

    let db = Database::open(&config).unwrap();
    db.register::<Account>().unwrap();
    db.insert(&account("ada", 36)).unwrap();
    db.close().unwrap();

    let db = Database::open(&config).unwrap();
    assert!(db.engine().check_exists("account"));
    assert_eq!(db.engine().table_names(), vec![String::from("account")]);
    db.register::<Account>().unwrap();
    assert_eq!(db.count::<Account>().unwrap(), 1);
}

#[test]
fn test_json_scheme_file() {
    let dir = tempfile::tempdir().unwrap();
    let scheme = dir.path().join("scheme.json");
    let config = ShapeConfig {
        url: format!("sqlite://{}", dir.path().join("app.db").display()),
        scheme_file: Some(scheme.clone()),
        ..ShapeConfig::default()
    };

    let db = Database::open(&config).unwrap();
    db.register::<Setting>().unwrap();
    db.close().unwrap();

    let store = JsonFileStore::open(&scheme).unwrap();
    let record = oxide_shape::SchemeStore::get(&store, "setting")
        .unwrap()
        .unwrap();
    assert_eq!(record.local_name, "Setting");
    assert_eq!(record.scheme_version, 1);
}

#[test]
fn test_with_transport_and_memory_store() {
    let driver = SqliteDriver::in_memory().unwrap();
    let transport = Arc::new(Transport::with_driver(Dialect::Sqlite, Box::new(driver)));
    let db = Database::with_transport(transport, Box::new(MemoryStore::new()), 3).unwrap();
    db.register::<Setting>().unwrap();
    assert_eq!(
        db.engine().remote_record("setting").unwrap().scheme_version,
        3
    );
}
