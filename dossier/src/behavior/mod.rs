//! Pluggable observers of the entity lifecycle.
//!
//! Behaviors are registered per entity type with [`Manager::add_behavior`] and are notified in
//! registration order before the event buses. The first behavior answering `Some(false)`
//! cancels the operation and the remaining behaviors of that pass are skipped.
//!
//! [`Manager::add_behavior`]: crate::Manager::add_behavior

mod soft_delete;
mod timestampable;

pub use soft_delete::SoftDelete;
pub use timestampable::Timestampable;

use crate::{Error, Event, Record, Result};
use mongodb::bson::Bson;

pub trait Behavior: Send + Sync {
    /// Receives a lifecycle event of an entity. `Some(false)` cancels the operation.
    fn notify(&self, _event: Event, _record: &mut dyn Record) -> Result<Option<bool>> {
        Ok(None)
    }

    /// Answers a method the entity does not implement. `None` means "not handled here".
    fn missing_method(
        &self,
        _record: &mut dyn Record,
        _method: &str,
        _arguments: &[Bson],
    ) -> Result<Option<Bson>> {
        Ok(None)
    }
}

/// Rejects a `field` option naming an attribute `record` does not declare.
fn declared_field<'a>(record: &dyn Record, field: &'a str) -> Result<&'a str> {
    if record.has_attribute(field) {
        return Ok(field);
    }

    Err(Error::InvalidBehaviorOption {
        option: "field",
        reason: "names an undeclared attribute",
    })
}
