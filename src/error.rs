use thiserror::Error;

/// Errors surfaced by the model layer.
///
/// Engine-reported failures are wrapped in [`Error::Storage`] and never
/// swallowed; the single missing-table recovery in `Model::create` is the
/// only retry path in the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A storage type could not be inferred for a value or declaration.
    #[error("unrecognized storage type for {0}")]
    UnrecognizedType(String),

    /// A field name was supplied that the model's schema does not declare.
    #[error("model '{model}' has no column with name '{column}'")]
    UnknownColumn { model: String, column: String },

    /// Two field declarations resolved to the same column name.
    #[error("model '{model}' declares column '{column}' more than once")]
    DuplicateColumn { model: String, column: String },

    /// A reference column has no resolver registered for its target model.
    /// Indicates a derivation-order bug: the referenced model was never built.
    #[error("no foreign-key resolver registered for model '{0}'")]
    UnregisteredForeignKey(String),

    /// The operation requires a record that has been persisted (has a
    /// primary key), but the record was never created.
    #[error("record of model '{0}' has no primary key; create it first")]
    UnpersistedRecord(String),

    /// Any execution error reported by the underlying engine.
    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
