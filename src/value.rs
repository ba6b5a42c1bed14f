use crate::error::{Error, Result};
use crate::model::Record;
use rusqlite::types::{Value as SqlValue, ValueRef};
use std::fmt;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};

/// Text layout used to persist TIMESTAMP columns. Nanosecond precision so a
/// stored value reads back equal to the one written.
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:9]");

/// Text layout used to persist DATE columns.
const DATE_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

/// A field value, covering every storage class the mapper supports.
///
/// The set is closed on purpose: storage-type inference is an exhaustive
/// match over these variants instead of open-ended inspection of arbitrary
/// types. `Record` holds a resolved foreign reference; it is stored as the
/// referenced record's primary key.
///
/// Booleans share the INTEGER storage class, so a `Boolean` written through
/// `create` reads back as `Integer`; equality treats `Boolean(true)` and
/// `Integer(1)` as the same value to keep round trips symmetric.
///
/// Application enums have no dedicated variant: store them by name as text
/// and match on the text coming back.
///
/// ```
/// use litemodel::{StorageType, Value};
///
/// enum Position {
///     Pitcher,
///     Shortstop,
/// }
///
/// impl From<Position> for Value {
///     fn from(position: Position) -> Self {
///         Value::Text(
///             match position {
///                 Position::Pitcher => "P",
///                 Position::Shortstop => "SS",
///             }
///             .into(),
///         )
///     }
/// }
///
/// assert_eq!(
///     Value::from(Position::Shortstop).storage_type().unwrap(),
///     StorageType::Text
/// );
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(PrimitiveDateTime),
    Date(Date),
    Record(Box<Record>),
}

/// The engine-side column type holding a field's values.
///
/// `Reference` is tagged with the referenced model's name so foreign keys to
/// different targets stay distinguishable; on the engine side it is a plain
/// INTEGER holding the target's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    Text,
    Integer,
    Real,
    Blob,
    Timestamp,
    Date,
    Reference(&'static str),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::Integer(l), Self::Integer(r)) => l == r,
            // Booleans and integers share a storage class and compare across
            // it, so a stored boolean equals its decoded integer form.
            (Self::Boolean(b), Self::Integer(i)) | (Self::Integer(i), Self::Boolean(b)) => {
                *i == *b as i64
            }
            (Self::Real(l), Self::Real(r)) => l == r,
            (Self::Text(l), Self::Text(r)) => l == r,
            (Self::Blob(l), Self::Blob(r)) => l == r,
            (Self::Timestamp(l), Self::Timestamp(r)) => l == r,
            (Self::Date(l), Self::Date(r)) => l == r,
            (Self::Record(l), Self::Record(r)) => l == r,
            _ => false,
        }
    }
}

impl StorageType {
    /// The SQL type name written into CREATE TABLE.
    pub fn sql_type(&self) -> &'static str {
        match self {
            StorageType::Text => "TEXT",
            StorageType::Integer => "INTEGER",
            StorageType::Real => "REAL",
            StorageType::Blob => "BLOB",
            StorageType::Timestamp => "TIMESTAMP",
            StorageType::Date => "DATE",
            StorageType::Reference(..) => "INTEGER",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::Reference(model) => write!(f, "REFERENCE({model})"),
            other => f.write_str(other.sql_type()),
        }
    }
}

impl Value {
    /// Infers the storage type of this value. Deterministic: the same
    /// variant always maps to the same storage type. Booleans share the
    /// INTEGER storage class. Fails for `Null`, the one value with no
    /// inferable class.
    pub fn storage_type(&self) -> Result<StorageType> {
        match self {
            Value::Null => Err(Error::UnrecognizedType("a null value".into())),
            Value::Boolean(..) | Value::Integer(..) => Ok(StorageType::Integer),
            Value::Real(..) => Ok(StorageType::Real),
            Value::Text(..) => Ok(StorageType::Text),
            Value::Blob(..) => Ok(StorageType::Blob),
            Value::Timestamp(..) => Ok(StorageType::Timestamp),
            Value::Date(..) => Ok(StorageType::Date),
            Value::Record(record) => Ok(StorageType::Reference(record.model_name())),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Coerces this value into the engine's representation: booleans become
    /// integers, timestamps and dates become text, references become the
    /// referenced record's primary key.
    pub(crate) fn to_storage(&self) -> Result<SqlValue> {
        Ok(match self {
            Value::Null => SqlValue::Null,
            Value::Boolean(b) => SqlValue::Integer(*b as i64),
            Value::Integer(i) => SqlValue::Integer(*i),
            Value::Real(r) => SqlValue::Real(*r),
            Value::Text(t) => SqlValue::Text(t.clone()),
            Value::Blob(b) => SqlValue::Blob(b.clone()),
            Value::Timestamp(ts) => SqlValue::Text(
                ts.format(TIMESTAMP_FORMAT)
                    .map_err(|e| Error::UnrecognizedType(format!("timestamp {ts}: {e}")))?,
            ),
            Value::Date(d) => SqlValue::Text(
                d.format(DATE_FORMAT)
                    .map_err(|e| Error::UnrecognizedType(format!("date {d}: {e}")))?,
            ),
            Value::Record(record) => match record.key() {
                Some(key) => SqlValue::Integer(key),
                None => return Err(Error::UnpersistedRecord(record.model_name().into())),
            },
        })
    }

    /// Decodes a raw engine value against the column's declared storage
    /// type. Reference columns decode to their stored key (`Integer`); the
    /// row mapper turns those into live records afterwards.
    pub(crate) fn from_storage(raw: ValueRef<'_>, storage: StorageType) -> Result<Value> {
        let mismatch = |raw: ValueRef<'_>| {
            Error::UnrecognizedType(format!("{} value in a {storage} column", raw.data_type()))
        };
        Ok(match (storage, raw) {
            (_, ValueRef::Null) => Value::Null,
            (StorageType::Integer | StorageType::Reference(..), ValueRef::Integer(i)) => {
                Value::Integer(i)
            }
            (StorageType::Real, ValueRef::Real(r)) => Value::Real(r),
            (StorageType::Real, ValueRef::Integer(i)) => Value::Real(i as f64),
            (StorageType::Text, ValueRef::Text(bytes)) => Value::Text(
                std::str::from_utf8(bytes)
                    .map_err(|_| mismatch(raw))?
                    .to_owned(),
            ),
            (StorageType::Blob, ValueRef::Blob(bytes)) => Value::Blob(bytes.to_vec()),
            (StorageType::Timestamp, ValueRef::Text(bytes)) => {
                let text = std::str::from_utf8(bytes).map_err(|_| mismatch(raw))?;
                Value::Timestamp(
                    PrimitiveDateTime::parse(text, TIMESTAMP_FORMAT)
                        .map_err(|e| Error::UnrecognizedType(format!("timestamp '{text}': {e}")))?,
                )
            }
            (StorageType::Date, ValueRef::Text(bytes)) => {
                let text = std::str::from_utf8(bytes).map_err(|_| mismatch(raw))?;
                Value::Date(
                    Date::parse(text, DATE_FORMAT)
                        .map_err(|e| Error::UnrecognizedType(format!("date '{text}': {e}")))?,
                )
            }
            (_, raw) => return Err(mismatch(raw)),
        })
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl From<PrimitiveDateTime> for Value {
    fn from(v: PrimitiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Date> for Value {
    fn from(v: Date) -> Self {
        Value::Date(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(Box::new(v))
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
