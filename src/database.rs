//! The shared context every model operates against: one SQLite connection
//! plus the registry of foreign-key resolvers.

use crate::error::{Error, Result};
use crate::model::Record;
use rusqlite::Connection;
use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::path::Path;

/// Loads a referenced record by its stored primary key.
pub type Resolver = Box<dyn Fn(&Database, i64) -> Result<Option<Record>>>;

/// Owns the single connection shared by every model, and the converter
/// registry mapping a referenced model's name to its resolver.
///
/// Single-threaded by design: operations block on the engine call and no
/// locking is done here. Whatever isolation the engine provides is all
/// concurrent callers get.
pub struct Database {
    conn: RefCell<Connection>,
    converters: RefCell<HashMap<&'static str, Resolver>>,
}

impl Database {
    /// Opens (creating if necessary) the database file at `path`.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        log::info!("connected to sqlite database at {}", path.display());
        Ok(Self::from_connection(conn))
    }

    /// Opens a fresh in-memory database.
    pub fn connect_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: RefCell::new(conn),
            converters: RefCell::new(HashMap::new()),
        }
    }

    /// Direct access to the underlying connection, for ad-hoc SQL the model
    /// layer does not cover. Do not hold the borrow across model calls.
    pub fn raw_connection(&self) -> RefMut<'_, Connection> {
        self.conn.borrow_mut()
    }

    pub(crate) fn connection_mut(&self) -> RefMut<'_, Connection> {
        self.conn.borrow_mut()
    }

    /// Registers a resolver for records of `target`. Idempotent: the first
    /// registration wins and later ones are ignored, so re-deriving a schema
    /// never replaces an existing entry.
    pub(crate) fn register_converter(&self, target: &'static str, resolver: Resolver) {
        self.converters.borrow_mut().entry(target).or_insert(resolver);
    }

    /// Dispatches a stored key to the resolver registered for `target`.
    /// Callers handle null keys before dispatching; a missing entry means the
    /// referenced model was never built against this database.
    pub(crate) fn resolve_reference(&self, target: &'static str, key: i64) -> Result<Option<Record>> {
        let converters = self.converters.borrow();
        match converters.get(target) {
            Some(resolver) => resolver(self, key),
            None => Err(Error::UnregisteredForeignKey(target.into())),
        }
    }

    #[cfg(test)]
    pub(crate) fn has_converter(&self, target: &str) -> bool {
        self.converters.borrow().contains_key(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolving_without_a_registration_fails() {
        let db = Database::connect_in_memory().unwrap();
        assert!(matches!(
            db.resolve_reference("ghost", 1),
            Err(Error::UnregisteredForeignKey(..))
        ));
    }

    #[test]
    fn first_registration_wins() {
        let db = Database::connect_in_memory().unwrap();
        db.register_converter("person", Box::new(|_, _| Ok(None)));
        db.register_converter(
            "person",
            Box::new(|_, _| Err(Error::UnregisteredForeignKey("person".into()))),
        );
        assert!(db.has_converter("person"));
        assert!(matches!(db.resolve_reference("person", 7), Ok(None)));
    }
}
