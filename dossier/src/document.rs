use crate::{
    Error, Result,
    attributes::{self, Attributes, ColumnMap},
};
use mongodb::bson::{Bson, Document};
use tracing::trace;

/// An embedded value object with array-like field access.
///
/// Derive it with `#[derive(TypedDocument)]`. The derive also implements `serde` traits, so
/// a typed document can be used as the type of an entity field and is stored as a nested
/// document.
pub trait TypedDocument: Attributes + Default + Sized {
    /// Runs once on [`TypedDocument::new`], before the data is assigned.
    fn on_construct(&mut self, _data: &Document) {}

    fn new(data: Document) -> Result<Self> {
        let mut document = Self::default();

        document.on_construct(&data);
        attributes::assign(&mut document, data, None, None)?;

        Ok(document)
    }

    fn assign(&mut self, data: Document) -> Result<&mut Self> {
        attributes::assign(self, data, None, None)?;

        Ok(self)
    }

    fn assign_with(
        &mut self,
        data: Document,
        column_map: Option<&ColumnMap>,
        whitelist: Option<&[&str]>,
    ) -> Result<&mut Self> {
        attributes::assign(self, data, column_map, whitelist)?;

        Ok(self)
    }

    /// Whether `name` is a declared field holding a non-null value.
    fn offset_exists(&self, name: &str) -> bool {
        matches!(self.read_field(name), Ok(Some(value)) if value != Bson::Null)
    }

    fn offset_get(&self, name: &str) -> Result<Option<Bson>> {
        self.read_field(name)
    }

    /// Writes a declared field. Undeclared names are ignored.
    fn offset_set(&mut self, name: &str, value: impl Into<Bson>) -> Result<()> {
        if !self.write_field(name, value.into())? {
            trace!(attribute = name, "ignoring write to an undeclared attribute");
        }

        Ok(())
    }

    fn offset_unset(&mut self, name: &str) -> Result<()> {
        Err(Error::AttributeNotRemovable {
            attribute: name.to_owned(),
        })
    }

    fn read_attribute(&self, name: &str) -> Result<Option<Bson>> {
        self.read_field(name)
    }

    fn write_attribute(&mut self, name: &str, value: impl Into<Bson>) -> Result<()> {
        self.offset_set(name, value)
    }

    fn to_array(&self) -> Result<Document> {
        let mut document = Document::new();
        attributes::raw_fields(self, &mut document)?;

        Ok(document)
    }

    fn json_serialize(&self) -> Result<serde_json::Value> {
        let mut document = Document::new();
        attributes::serialized_fields(self, &mut document)?;

        Ok(Bson::Document(document).into_relaxed_extjson())
    }

    fn bson_serialize(&self) -> Result<Document> {
        self.to_array()
    }

    /// Restores fields from a stored document, bypassing setter overrides.
    fn bson_unserialize(&mut self, data: Document) -> Result<()> {
        for (name, value) in data {
            self.write_field(&name, value)?;
        }

        Ok(())
    }

    /// Materializes a stored document without running [`TypedDocument::on_construct`].
    fn from_bson_document(data: Document) -> Result<Self> {
        let mut document = Self::default();
        document.bson_unserialize(data)?;

        Ok(document)
    }
}
