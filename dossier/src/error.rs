use mongodb::bson;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by Dossier.
///
/// Configuration errors ([`Error::NoContainer`], [`Error::Unbound`],
/// [`Error::InvalidConnection`], [`Error::EmptySource`]) indicate a setup problem and are
/// never retried. Validation failures and unacknowledged writes are not errors: lifecycle
/// operations report them as `Ok(false)` with messages attached to the entity.
#[derive(Debug, Error)]
pub enum Error {
    #[error("a dependency injection container is required to obtain the services related to the ODM")]
    NoContainer,

    #[error("`{type_name}` is not bound to a collections manager")]
    Unbound { type_name: &'static str },

    #[error("invalid injected connection service `{service}`")]
    InvalidConnection { service: String },

    #[error("the source of `{type_name}` resolves to an empty string")]
    EmptySource { type_name: String },

    #[error("the document cannot be {operation} because it doesn't exist")]
    NotFound { operation: &'static str },

    #[error("attribute `{attribute}` cannot be removed from a document")]
    AttributeNotRemovable { attribute: String },

    #[error("behavior option `{option}` {reason}")]
    InvalidBehaviorOption {
        option: &'static str,
        reason: &'static str,
    },

    #[error("invalid object id: {0}")]
    InvalidObjectId(#[from] bson::oid::Error),

    #[error("unsupported operator or stage `{0}`")]
    Unsupported(String),

    #[error("duplicate key {0}")]
    DuplicateKey(bson::Bson),

    #[error(transparent)]
    Serialize(#[from] bson::ser::Error),

    #[error(transparent)]
    Deserialize(#[from] bson::de::Error),

    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),
}
