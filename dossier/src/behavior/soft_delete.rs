use super::{Behavior, declared_field};
use crate::{Error, Event, Record, Result};
use mongodb::bson::{Bson, Document, doc};
use tracing::debug;

/// Flags a document as deleted instead of removing it.
///
/// On `beforeDelete` the delete is skipped and, unless the flag field already holds the
/// flag value, the value is persisted through an ordinary save of a copy of the entity. The
/// original entity only receives the flag once that save succeeded.
///
/// ```ignore
/// manager.add_behavior::<Robots>(SoftDelete::new("deleted", true));
/// ```
#[derive(Clone, Debug)]
pub struct SoftDelete {
    options: Document,
}

impl SoftDelete {
    pub fn new(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self {
            options: doc! { "field": field.into(), "value": value.into() },
        }
    }

    /// Builds the behavior from a `{ field, value }` options document.
    ///
    /// Options are checked when the behavior acts, not here.
    pub fn from_options(options: Document) -> Self {
        Self { options }
    }

    fn field(&self) -> Result<&str> {
        match self.options.get("field") {
            Some(Bson::String(field)) => Ok(field),
            _ => Err(Error::InvalidBehaviorOption {
                option: "field",
                reason: "must be a string",
            }),
        }
    }

    fn value(&self) -> Result<&Bson> {
        match self.options.get("value") {
            Some(Bson::Null) | None => Err(Error::InvalidBehaviorOption {
                option: "value",
                reason: "is required",
            }),
            Some(value) => Ok(value),
        }
    }
}

impl Behavior for SoftDelete {
    fn notify(&self, event: Event, record: &mut dyn Record) -> Result<Option<bool>> {
        if event != Event::BeforeDelete {
            return Ok(None);
        }

        let value = self.value()?;
        let field = declared_field(record, self.field()?)?;

        record.skip_operation(true);

        if record.read_attribute(field)?.as_ref() == Some(value) {
            debug!(entity = record.type_name(), field, "already flagged as deleted");
            return Ok(None);
        }

        let mut update = record.clone_record();
        update.write_attribute(field, value.clone())?;

        if !update.save()? {
            for message in update.messages() {
                record.append_message(message.clone());
            }

            return Ok(Some(false));
        }

        record.write_attribute(field, value.clone())?;

        Ok(None)
    }
}
