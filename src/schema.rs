use crate::error::{Error, Result};
use crate::model::Model;
use crate::value::{StorageType, Value};

/// Name of the implicit primary-key column every schema starts with.
pub(crate) const PRIMARY_KEY: &str = "idx";

/// Suffix appended to reference columns on the engine side. Internal only:
/// row mapping strips it before field names reach a record.
pub(crate) const REFERENCE_SUFFIX: &str = "_idx";

/// Produces a field's value when a record is constructed without one.
#[derive(Debug, Clone)]
pub enum FieldDefault {
    /// No default: the field starts out null.
    Null,
    /// A literal, cloned into every new record.
    Literal(Value),
    /// A zero-argument factory, invoked fresh for every new record.
    Factory(fn() -> Value),
}

impl FieldDefault {
    pub(crate) fn produce(&self) -> Value {
        match self {
            FieldDefault::Null => Value::Null,
            FieldDefault::Literal(value) => value.clone(),
            FieldDefault::Factory(factory) => factory(),
        }
    }
}

/// One declared field of a model, built up method by method.
///
/// Each declaration supplies a storage type (explicitly, inferred from a
/// literal default, or implied by a reference target), an optional default
/// producer, and any SQL modifiers appended verbatim to the column DDL.
#[derive(Debug, Clone)]
pub struct FieldDef {
    name: &'static str,
    storage: Option<StorageType>,
    default: FieldDefault,
    modifiers: Vec<&'static str>,
    reference: Option<Model>,
}

impl FieldDef {
    /// A column of the given storage type with no default.
    pub fn typed(name: &'static str, storage: StorageType) -> Self {
        Self {
            name,
            storage: Some(storage),
            default: FieldDefault::Null,
            modifiers: Vec::new(),
            reference: None,
        }
    }

    /// A column whose storage type is inferred from its literal default.
    pub fn with_default(name: &'static str, default: impl Into<Value>) -> Self {
        Self {
            name,
            storage: None,
            default: FieldDefault::Literal(default.into()),
            modifiers: Vec::new(),
            reference: None,
        }
    }

    /// A column holding the primary key of a record of `target`.
    pub fn reference(name: &'static str, target: &Model) -> Self {
        Self {
            name,
            storage: Some(StorageType::Reference(target.name())),
            default: FieldDefault::Null,
            modifiers: Vec::new(),
            reference: Some(target.clone()),
        }
    }

    /// Replaces the default with a literal value.
    pub fn default_value(mut self, default: impl Into<Value>) -> Self {
        self.default = FieldDefault::Literal(default.into());
        self
    }

    /// Replaces the default with a factory invoked per record construction.
    pub fn factory(mut self, factory: fn() -> Value) -> Self {
        self.default = FieldDefault::Factory(factory);
        self
    }

    /// Appends a SQL fragment to the column definition, e.g. `NOT NULL`.
    pub fn modifier(mut self, fragment: &'static str) -> Self {
        self.modifiers.push(fragment);
        self
    }

    /// Shorthand for the UNIQUE modifier.
    pub fn unique(self) -> Self {
        self.modifier("UNIQUE")
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn reference_target(&self) -> Option<&Model> {
        self.reference.as_ref()
    }

    fn storage(&self) -> Result<StorageType> {
        if let Some(storage) = self.storage {
            return Ok(storage);
        }
        match &self.default {
            FieldDefault::Literal(value) => value.storage_type(),
            _ => Err(Error::UnrecognizedType(format!(
                "field '{}' declared without a type or literal default",
                self.name
            ))),
        }
    }
}

/// One column of a derived schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// The field name exposed on records.
    pub field: &'static str,
    /// The engine-side column name (reference fields carry an internal
    /// suffix here).
    pub name: String,
    pub storage: StorageType,
    pub modifiers: Vec<&'static str>,
    pub primary_key: bool,
}

/// An ordered column list derived from a model's field declarations.
///
/// Column order is the declaration order with the primary key prepended, and
/// is stable across derivations: row mapping is positional.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    table: &'static str,
    columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Field names in column order, primary key included.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.field)
    }

    pub(crate) fn primary_key(&self) -> &ColumnDef {
        &self.columns[0]
    }

    pub(crate) fn column_for_field(&self, field: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.field == field)
    }
}

/// Derives the ordered schema and the parallel default producers from a
/// model's declarations.
pub(crate) fn derive(
    table: &'static str,
    fields: &[FieldDef],
) -> Result<(Schema, Vec<FieldDefault>)> {
    let mut columns = Vec::with_capacity(fields.len() + 1);
    columns.push(ColumnDef {
        field: PRIMARY_KEY,
        name: PRIMARY_KEY.into(),
        storage: StorageType::Integer,
        modifiers: vec!["PRIMARY KEY"],
        primary_key: true,
    });
    let mut defaults = Vec::with_capacity(fields.len());
    for field in fields {
        if columns.iter().any(|c| c.field == field.name) {
            return Err(Error::DuplicateColumn {
                model: table.into(),
                column: field.name.into(),
            });
        }
        let storage = field.storage()?;
        let name = match storage {
            StorageType::Reference(..) => format!("{}{}", field.name, REFERENCE_SUFFIX),
            _ => field.name.into(),
        };
        columns.push(ColumnDef {
            field: field.name,
            name,
            storage,
            modifiers: field.modifiers.clone(),
            primary_key: false,
        });
        defaults.push(field.default.clone());
    }
    Ok((Schema { table, columns }, defaults))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_fields() -> Vec<FieldDef> {
        vec![
            FieldDef::with_default("name", "default"),
            FieldDef::typed("age", StorageType::Integer),
            FieldDef::with_default("cakes", 0),
        ]
    }

    #[test]
    fn primary_key_comes_first() {
        let (schema, _) = derive("person", &person_fields()).unwrap();
        let pk = schema.primary_key();
        assert_eq!(pk.field, "idx");
        assert_eq!(pk.storage, StorageType::Integer);
        assert_eq!(pk.modifiers, vec!["PRIMARY KEY"]);
    }

    #[test]
    fn declaration_order_preserved() {
        let (schema, _) = derive("person", &person_fields()).unwrap();
        let fields: Vec<_> = schema.fields().collect();
        assert_eq!(fields, vec!["idx", "name", "age", "cakes"]);
    }

    #[test]
    fn storage_inferred_from_default() {
        let (schema, defaults) = derive("person", &person_fields()).unwrap();
        assert_eq!(schema.columns()[1].storage, StorageType::Text);
        assert_eq!(schema.columns()[3].storage, StorageType::Integer);
        assert_eq!(defaults[0].produce(), Value::from("default"));
        assert_eq!(defaults[1].produce(), Value::Null);
        assert_eq!(defaults[2].produce(), Value::from(0));
    }

    #[test]
    fn derivation_is_stable() {
        let fields = person_fields();
        let (first, _) = derive("person", &fields).unwrap();
        let (second, _) = derive("person", &fields).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_field_rejected() {
        let fields = vec![
            FieldDef::typed("age", StorageType::Integer),
            FieldDef::with_default("age", 3),
        ];
        assert!(matches!(
            derive("person", &fields),
            Err(Error::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn reserved_primary_key_name_rejected() {
        let fields = vec![FieldDef::typed("idx", StorageType::Integer)];
        assert!(matches!(
            derive("person", &fields),
            Err(Error::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn factory_without_type_rejected() {
        let fields = vec![FieldDef {
            name: "created",
            storage: None,
            default: FieldDefault::Factory(|| Value::Null),
            modifiers: Vec::new(),
            reference: None,
        }];
        assert!(matches!(
            derive("person", &fields),
            Err(Error::UnrecognizedType(..))
        ));
    }

    #[test]
    fn modifiers_attached_to_column() {
        let fields = vec![FieldDef::typed("email", StorageType::Text).unique()];
        let (schema, _) = derive("person", &fields).unwrap();
        assert_eq!(schema.columns()[1].modifiers, vec!["UNIQUE"]);
    }
}
