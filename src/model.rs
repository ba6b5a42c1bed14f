//! Models, records, and the lifecycle operations tying schema derivation,
//! statement generation, and row mapping to the engine.

use crate::database::Database;
use crate::error::{Error, Result};
use crate::schema::{self, FieldDef, FieldDefault, Schema, PRIMARY_KEY};
use crate::statement;
use crate::value::{StorageType, Value};
use rusqlite::types::Value as SqlValue;
use rusqlite::ToSql;
use std::cell::Cell;
use std::rc::Rc;

/// A declared record type: name, derived schema, default producers, and the
/// confirmed-once table flag. Cheap to clone; all clones share state.
#[derive(Debug, Clone)]
pub struct Model {
    inner: Rc<ModelInner>,
}

#[derive(Debug)]
struct ModelInner {
    name: &'static str,
    schema: Schema,
    defaults: Vec<FieldDefault>,
    /// False until a write or table creation against this model succeeds;
    /// never cleared afterwards. Gates the missing-table recovery in
    /// [`Model::create`].
    table_ready: Cell<bool>,
}

/// Collects field declarations for [`Model::declare`].
pub struct ModelBuilder {
    name: &'static str,
    fields: Vec<FieldDef>,
}

impl ModelBuilder {
    /// Appends a field. Declaration order becomes column order.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Derives the schema and registers a foreign-key resolver for every
    /// referenced model (a no-op for targets already registered).
    pub fn build(self, db: &Database) -> Result<Model> {
        let (schema, defaults) = schema::derive(self.name, &self.fields)?;
        for field in &self.fields {
            if let Some(target) = field.reference_target() {
                let target = target.clone();
                db.register_converter(
                    target.name(),
                    Box::new(move |db, key| target.get_by_key(db, key)),
                );
            }
        }
        Ok(Model {
            inner: Rc::new(ModelInner {
                name: self.name,
                schema,
                defaults,
                table_ready: Cell::new(false),
            }),
        })
    }
}

impl Model {
    /// Starts declaring a model whose table is named `name`.
    pub fn declare(name: &'static str) -> ModelBuilder {
        ModelBuilder {
            name,
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// Field names in column order, primary key first.
    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.inner.schema.fields()
    }

    /// A new unpersisted record with every field set to its default.
    /// Factory defaults are invoked fresh on every call.
    pub fn record(&self) -> Record {
        let fields = self
            .inner
            .schema
            .columns()[1..]
            .iter()
            .zip(&self.inner.defaults)
            .map(|(col, default)| (col.field, default.produce()))
            .collect();
        Record {
            model: self.inner.name,
            key: None,
            fields,
        }
    }

    /// A new record with defaults applied and then the given field values.
    /// Unknown field names are rejected.
    pub fn record_with<'a, I>(&self, values: I) -> Result<Record>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut record = self.record();
        for (field, value) in values {
            record.set(field, value)?;
        }
        Ok(record)
    }

    /// Issues CREATE TABLE IF NOT EXISTS and marks the table confirmed.
    pub fn create_table(&self, db: &Database) -> Result<()> {
        let sql = statement::create_table(&self.inner.schema);
        log::info!("creating table '{}'", self.inner.name);
        self.run_write(db, &sql, &[])?;
        Ok(())
    }

    /// Inserts `record` and captures the generated primary key onto it.
    ///
    /// If the insert fails because the table does not exist and this model
    /// has never confirmed its table, the table is created and the insert
    /// retried exactly once. Every other failure propagates untouched.
    pub fn create(&self, db: &Database, record: &mut Record) -> Result<()> {
        debug_assert_eq!(record.model, self.inner.name);
        let sql = statement::insert(&self.inner.schema);
        let mut params = Vec::with_capacity(record.fields.len());
        for (field, value) in &record.fields {
            let col = self.inner.schema.column_for_field(field).expect("schema field");
            params.push((format!(":{}", col.name), value.to_storage()?));
        }
        let key = match self.run_write(db, &sql, &params) {
            Ok(key) => key,
            Err(Error::Storage(err))
                if is_missing_table(&err) && !self.inner.table_ready.get() =>
            {
                log::info!(
                    "table '{}' missing, creating it and retrying the insert",
                    self.inner.name
                );
                self.create_table(db)?;
                self.run_write(db, &sql, &params)?
            }
            Err(err) => return Err(err),
        };
        record.key = Some(key);
        Ok(())
    }

    /// Fetches the record with the given primary key, if any.
    pub fn get_by_key(&self, db: &Database, key: i64) -> Result<Option<Record>> {
        let mut found = self.select(db, Some(1), &[(PRIMARY_KEY, Value::Integer(key))])?;
        Ok(found.pop())
    }

    /// Fetches the most-recently-created record matching every filter, or
    /// `None`. Filters are (field, value) equality pairs.
    pub fn get_one(&self, db: &Database, filters: &[(&str, Value)]) -> Result<Option<Record>> {
        let mut found = self.select(db, Some(1), filters)?;
        Ok(found.pop())
    }

    /// Fetches records matching every filter, newest first, at most `limit`
    /// of them when one is given.
    pub fn get_many(
        &self,
        db: &Database,
        limit: Option<u32>,
        filters: &[(&str, Value)],
    ) -> Result<Vec<Record>> {
        self.select(db, limit, filters)
    }

    /// Writes the record's current field values back by primary key.
    pub fn update(&self, db: &Database, record: &Record) -> Result<()> {
        let key = record
            .key
            .ok_or_else(|| Error::UnpersistedRecord(self.inner.name.into()))?;
        let sql = statement::update(&self.inner.schema);
        let mut params = Vec::with_capacity(record.fields.len() + 1);
        params.push((format!(":{PRIMARY_KEY}"), SqlValue::Integer(key)));
        for (field, value) in &record.fields {
            let col = self.inner.schema.column_for_field(field).expect("schema field");
            params.push((format!(":{}", col.name), value.to_storage()?));
        }
        self.run_write(db, &sql, &params)?;
        Ok(())
    }

    /// Removes the record's row by primary key.
    pub fn delete(&self, db: &Database, record: &Record) -> Result<()> {
        let key = record
            .key
            .ok_or_else(|| Error::UnpersistedRecord(self.inner.name.into()))?;
        let sql = statement::delete(&self.inner.schema);
        let params = [(format!(":{PRIMARY_KEY}"), SqlValue::Integer(key))];
        self.run_write(db, &sql, &params)?;
        Ok(())
    }

    /// Runs one statement in its own transaction and reports the last
    /// inserted rowid. A successful write confirms the table.
    fn run_write(
        &self,
        db: &Database,
        sql: &str,
        params: &[(String, SqlValue)],
    ) -> Result<i64> {
        log::debug!("{sql}");
        let mut conn = db.connection_mut();
        let tx = conn.transaction()?;
        tx.execute(sql, &bind(params)[..])?;
        let key = tx.last_insert_rowid();
        tx.commit()?;
        self.inner.table_ready.set(true);
        Ok(key)
    }

    /// Executes a SELECT and maps the result set. Raw rows are decoded and
    /// collected while the connection is borrowed; references are resolved
    /// afterwards so resolver re-entry never nests transactions.
    fn select(
        &self,
        db: &Database,
        limit: Option<u32>,
        filters: &[(&str, Value)],
    ) -> Result<Vec<Record>> {
        let schema = &self.inner.schema;
        let mut columns = Vec::with_capacity(filters.len());
        let mut params = Vec::with_capacity(filters.len());
        for (field, value) in filters {
            let col = schema
                .column_for_field(field)
                .ok_or_else(|| Error::UnknownColumn {
                    model: self.inner.name.into(),
                    column: (*field).into(),
                })?;
            params.push((format!(":{}", col.name), value.to_storage()?));
            columns.push(col);
        }
        let sql = statement::select(schema, &columns, limit);
        log::debug!("{sql}");
        let raw_rows = {
            let mut conn = db.connection_mut();
            let tx = conn.transaction()?;
            let mut raw_rows = Vec::new();
            {
                let mut stmt = tx.prepare(&sql)?;
                let mut rows = stmt.query(&bind(&params)[..])?;
                while let Some(row) = rows.next()? {
                    let mut raw = Vec::with_capacity(schema.columns().len());
                    for (i, col) in schema.columns().iter().enumerate() {
                        raw.push(Value::from_storage(row.get_ref(i)?, col.storage)?);
                    }
                    raw_rows.push(raw);
                }
            }
            tx.commit()?;
            raw_rows
        };
        raw_rows
            .into_iter()
            .map(|raw| self.from_raw(db, raw))
            .collect()
    }

    /// Builds a record from one decoded row, resolving reference columns
    /// into live records. A null stored key stays null without dispatching;
    /// a dangling key (referenced row gone) also maps to null.
    fn from_raw(&self, db: &Database, raw: Vec<Value>) -> Result<Record> {
        let schema = &self.inner.schema;
        let mut values = raw.into_iter();
        let key = match values.next() {
            Some(Value::Integer(key)) => Some(key),
            _ => None,
        };
        let mut fields = Vec::with_capacity(schema.columns().len() - 1);
        for (col, value) in schema.columns()[1..].iter().zip(values) {
            let value = match (col.storage, value) {
                (StorageType::Reference(target), Value::Integer(stored)) => {
                    match db.resolve_reference(target, stored)? {
                        Some(record) => Value::Record(Box::new(record)),
                        None => Value::Null,
                    }
                }
                (_, value) => value,
            };
            fields.push((col.field, value));
        }
        Ok(Record {
            model: self.inner.name,
            key,
            fields,
        })
    }
}

fn bind(params: &[(String, SqlValue)]) -> Vec<(&str, &dyn ToSql)> {
    params
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect()
}

fn is_missing_table(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.starts_with("no such table"))
}

/// One in-memory instance of a model: an optional primary key plus a value
/// for every declared field, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    model: &'static str,
    key: Option<i64>,
    fields: Vec<(&'static str, Value)>,
}

impl Record {
    pub fn model_name(&self) -> &'static str {
        self.model
    }

    /// The primary key, absent until the record is first created.
    pub fn key(&self) -> Option<i64> {
        self.key
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value)
    }

    /// Sets a field value. The primary-key field accepts an integer or null;
    /// any name outside the schema is rejected.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if field == PRIMARY_KEY {
            self.key = match value {
                Value::Null => None,
                Value::Integer(key) => Some(key),
                other => {
                    return Err(Error::UnrecognizedType(format!(
                        "primary key value {other:?}"
                    )))
                }
            };
            return Ok(());
        }
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => {
                slot.1 = value;
                Ok(())
            }
            None => Err(Error::UnknownColumn {
                model: self.model.into(),
                column: field.into(),
            }),
        }
    }

    /// Field names and values in declaration order, primary key excluded.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Value)> + '_ {
        self.fields.iter().map(|(name, value)| (*name, value))
    }
}
