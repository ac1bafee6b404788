//! Descriptor-driven attribute access shared by entities and typed documents.
//!
//! The field table of a type is generated at compile time by `#[derive(Entity)]` or
//! `#[derive(TypedDocument)]`; nothing here enumerates fields at runtime.

use crate::Result;
use mongodb::bson::{Bson, Document};
use std::collections::{BTreeSet, HashMap};

/// Bookkeeping attribute names that are never persisted nor serialized.
pub const BASE_RESERVED: &[&str] = &[
    "connection",
    "container",
    "operation_made",
    "error_messages",
    "dirty_state",
    "collections_manager",
    "skipped",
];

/// Renames input keys before assignment: input key → attribute name.
pub type ColumnMap = HashMap<String, String>;

/// One declared field of an entity or typed document.
#[derive(Debug)]
pub struct FieldDescriptor {
    name: &'static str,
    reserved: bool,
    setter: bool,
    getter: bool,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            reserved: false,
            setter: false,
            getter: false,
        }
    }

    pub const fn reserved(mut self) -> Self {
        self.reserved = true;
        self
    }

    pub const fn with_setter(mut self) -> Self {
        self.setter = true;
        self
    }

    pub const fn with_getter(mut self) -> Self {
        self.getter = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn has_setter(&self) -> bool {
        self.setter
    }

    pub fn has_getter(&self) -> bool {
        self.getter
    }
}

/// The static field table of a type.
#[derive(Debug)]
pub struct Schema {
    fields: &'static [FieldDescriptor],
    base_reserved: &'static [&'static str],
}

impl Schema {
    /// Schema of a persistent entity, reserving [`BASE_RESERVED`] on top of declared fields.
    pub const fn new(fields: &'static [FieldDescriptor]) -> Self {
        Self {
            fields,
            base_reserved: BASE_RESERVED,
        }
    }

    /// Schema of an embedded document, which has no bookkeeping attributes.
    pub const fn embedded(fields: &'static [FieldDescriptor]) -> Self {
        Self {
            fields,
            base_reserved: &[],
        }
    }

    pub fn fields(&self) -> &'static [FieldDescriptor] {
        self.fields
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.base_reserved.contains(&name) || self.field(name).is_some_and(|field| field.reserved)
    }

    pub fn reserved_attributes(&self) -> BTreeSet<&'static str> {
        self.base_reserved
            .iter()
            .copied()
            .chain(
                self.fields
                    .iter()
                    .filter(|field| field.reserved)
                    .map(|field| field.name),
            )
            .collect()
    }

    /// Declared fields that take part in persistence and serialization.
    pub fn persistent_fields(&self) -> impl Iterator<Item = &'static FieldDescriptor> + '_ {
        self.fields
            .iter()
            .filter(|field| !self.is_reserved(field.name))
    }
}

/// Field-level access generated by the derive macros.
pub trait Attributes {
    fn schema() -> &'static Schema;

    /// Raw value of a declared field, `None` for undeclared names.
    fn read_field(&self, name: &str) -> Result<Option<Bson>>;

    /// Raw write of a declared field. Returns `false` for undeclared names.
    fn write_field(&mut self, name: &str, value: Bson) -> Result<bool>;

    /// Runs the declared setter override, `None` when the field has none.
    fn call_setter(&mut self, name: &str, value: Bson) -> Option<Result<()>>;

    /// Runs the declared getter override, `None` when the field has none.
    fn call_getter(&self, name: &str) -> Option<Result<Bson>>;
}

pub(crate) fn assign<A: Attributes>(
    target: &mut A,
    data: Document,
    column_map: Option<&ColumnMap>,
    whitelist: Option<&[&str]>,
) -> Result<()> {
    let data = match column_map {
        Some(column_map) => data
            .into_iter()
            .filter_map(|(key, value)| column_map.get(&key).map(|key| (key.clone(), value)))
            .collect(),
        None => data,
    };

    if data.is_empty() {
        return Ok(());
    }

    for field in A::schema().persistent_fields() {
        let name = field.name();

        let Some(value) = data.get(name) else {
            continue;
        };

        if matches!(value, Bson::Null) {
            continue;
        }

        if whitelist.is_some_and(|whitelist| !whitelist.contains(&name)) {
            continue;
        }

        match target.call_setter(name, value.clone()) {
            Some(result) => result?,
            None => {
                target.write_field(name, value.clone())?;
            }
        }
    }

    Ok(())
}

pub(crate) fn raw_fields<A: Attributes>(source: &A, document: &mut Document) -> Result<()> {
    for field in A::schema().persistent_fields() {
        if let Some(value) = source.read_field(field.name())? {
            document.insert(field.name(), value);
        }
    }

    Ok(())
}

pub(crate) fn serialized_fields<A: Attributes>(source: &A, document: &mut Document) -> Result<()> {
    for field in A::schema().persistent_fields() {
        let value = match source.call_getter(field.name()) {
            Some(value) => Some(value?),
            None => source.read_field(field.name())?,
        };

        if let Some(value) = value {
            document.insert(field.name(), value);
        }
    }

    Ok(())
}
