use super::{Behavior, declared_field};
use crate::{Error, Event, Record, Result, id::convert_datetime};
use chrono::{
    Local, Utc,
    format::{Item, StrftimeItems},
};
use mongodb::bson::{Bson, Document};
use std::{collections::HashMap, fmt, sync::Arc};

type Generator = Arc<dyn Fn() -> Bson + Send + Sync>;

/// Writes the current time into one or more fields on configured events.
///
/// Options are keyed by event name; each holds a `field` (a name or an array of names), an
/// optional strftime `format` and an optional `date` flag. A format yields a string, `date:
/// true` a BSON date. Otherwise a generator registered for the event provides the value,
/// falling back to the Unix time in seconds. Every field must be declared by the entity.
///
/// ```ignore
/// manager.add_behavior::<Robots>(Timestampable::new(doc! {
///     "beforeCreate": { "field": "created_at", "format": "%Y-%m-%d %H:%M:%S" },
///     "beforeUpdate": { "field": ["updated_at", "touched_at"], "date": true },
/// }));
/// ```
#[derive(Clone, Default)]
pub struct Timestampable {
    options: Document,
    generators: HashMap<Event, Generator>,
}

impl Timestampable {
    pub fn new(options: Document) -> Self {
        Self {
            options,
            generators: HashMap::new(),
        }
    }

    /// Registers the value source used for `event` when its options carry no format.
    pub fn with_generator<F>(mut self, event: Event, generator: F) -> Self
    where
        F: Fn() -> Bson + Send + Sync + 'static,
    {
        self.generators.insert(event, Arc::new(generator));
        self
    }

    fn timestamp(&self, event: Event, options: &Document) -> Result<Bson> {
        if let Ok(format) = options.get_str("format") {
            let items = StrftimeItems::new(format).collect::<Vec<_>>();

            if items.iter().any(|item| matches!(item, Item::Error)) {
                return Err(Error::InvalidBehaviorOption {
                    option: "format",
                    reason: "is not a valid strftime format",
                });
            }

            return Ok(Bson::String(
                Local::now().format_with_items(items.into_iter()).to_string(),
            ));
        }

        if matches!(options.get("date"), Some(Bson::Boolean(true))) {
            return Ok(Bson::DateTime(convert_datetime(&Utc::now())));
        }

        if let Some(generator) = self.generators.get(&event) {
            return Ok(generator());
        }

        Ok(Bson::Int64(Utc::now().timestamp()))
    }
}

fn fields(options: &Document) -> Result<Vec<&str>> {
    let invalid = || Error::InvalidBehaviorOption {
        option: "field",
        reason: "is required and must be a string or an array of strings",
    };

    match options.get("field") {
        Some(Bson::String(field)) => Ok(vec![field.as_str()]),
        Some(Bson::Array(fields)) => fields
            .iter()
            .map(|field| field.as_str().ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

impl Behavior for Timestampable {
    fn notify(&self, event: Event, record: &mut dyn Record) -> Result<Option<bool>> {
        let Some(options) = self.options.get(event.as_str()) else {
            return Ok(None);
        };

        let Bson::Document(options) = options else {
            return Ok(None);
        };

        let fields = fields(options)?
            .into_iter()
            .map(|field| declared_field(&*record, field))
            .collect::<Result<Vec<_>>>()?;
        let timestamp = self.timestamp(event, options)?;

        for field in fields {
            record.write_attribute(field, timestamp.clone())?;
        }

        Ok(None)
    }
}

impl fmt::Debug for Timestampable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timestampable")
            .field("options", &self.options)
            .field("generators", &self.generators.keys().collect::<Vec<_>>())
            .finish()
    }
}
