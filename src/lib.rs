//! Declarative record types over SQLite.
//!
//! # Intention
//!
//! - Declare a model's fields once; the table schema is derived from the
//!   declarations, primary key included.
//! - Generate parameterized CRUD statements instead of hand-writing SQL,
//!   creating missing tables lazily on first insert.
//! - Map result rows back into records, resolving foreign-key columns into
//!   live referenced records.
//!
//! # Architectural Boundaries
//!
//! - SQL execution, transactions, and storage belong to rusqlite; this crate
//!   only generates statements and coerces values around it.
//! - Filters are equality conjunctions only, and CREATE TABLE IF NOT EXISTS
//!   is the only migration. Anything richer belongs to the caller.
//!
//! ```no_run
//! use litemodel::{FieldDef, Model, StorageType};
//!
//! # fn main() -> litemodel::Result<()> {
//! let db = litemodel::connect("people.db")?;
//! let person = Model::declare("person")
//!     .field(FieldDef::with_default("name", "default"))
//!     .field(FieldDef::typed("age", StorageType::Integer))
//!     .field(FieldDef::with_default("cakes", 0))
//!     .build(&db)?;
//!
//! let mut sam = person.record_with([("name", "Sam".into()), ("age", 22.into())])?;
//! person.create(&db, &mut sam)?;
//! let found = person.get_one(&db, &[("name", "Sam".into())])?;
//! assert_eq!(found.as_ref().and_then(|r| r.key()), sam.key());
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod error;
pub mod model;
pub mod schema;
pub mod value;

mod statement;

pub use database::{Database, Resolver};
pub use error::{Error, Result};
pub use model::{Model, ModelBuilder, Record};
pub use schema::{ColumnDef, FieldDef, FieldDefault, Schema};
pub use value::{StorageType, Value};

/// Opens the database at `path` and returns the context shared by every
/// model. Must be called before any model operation.
pub fn connect(path: impl AsRef<std::path::Path>) -> Result<Database> {
    Database::connect(path)
}
