use crate::{Connection, Manager};
use mongodb::bson::Bson;
use std::{fmt, sync::Arc};

/// Whether an entity is known to exist in its collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DirtyState {
    /// The store confirmed the document exists.
    Persistent,
    /// Not confirmed to be persisted yet.
    #[default]
    Transient,
    /// Removed from the store.
    Detached,
}

/// The mutating operation currently in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Operation {
    #[default]
    None,
    Create,
    Update,
    Delete,
}

/// A validation or failure message attached to an entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    message: String,
    field: Option<String>,
    kind: String,
    code: i32,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
            kind: String::new(),
            code: 0,
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn get_field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn get_kind(&self) -> &str {
        &self.kind
    }

    pub fn get_code(&self) -> i32 {
        self.code
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Bookkeeping carried by every entity.
///
/// An entity struct holds exactly one field of this type, marked with `#[entity(state)]`.
/// None of it is ever written to the store.
#[derive(Clone, Default)]
pub struct EntityState {
    pub(crate) manager: Option<Arc<Manager>>,
    pub(crate) connection: Option<Arc<dyn Connection>>,
    pub(crate) id: Option<Bson>,
    pub(crate) dirty_state: DirtyState,
    pub(crate) operation_made: Operation,
    pub(crate) error_messages: Vec<Message>,
    pub(crate) skipped: bool,
}

impl EntityState {
    /// The id, unless it is unset or empty.
    pub fn id(&self) -> Option<&Bson> {
        self.id.as_ref().filter(|id| !is_empty_id(id))
    }

    pub fn is_bound(&self) -> bool {
        self.manager.is_some()
    }
}

impl fmt::Debug for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityState")
            .field("id", &self.id)
            .field("dirty_state", &self.dirty_state)
            .field("operation_made", &self.operation_made)
            .field("error_messages", &self.error_messages)
            .field("skipped", &self.skipped)
            .field("bound", &self.manager.is_some())
            .finish_non_exhaustive()
    }
}

pub(crate) fn is_empty_id(id: &Bson) -> bool {
    match id {
        Bson::Null | Bson::Undefined | Bson::Boolean(false) | Bson::Int32(0) | Bson::Int64(0) => {
            true
        }
        Bson::String(id) => id.is_empty(),
        _ => false,
    }
}
