use crate::{Message, Record};

/// The answer of a [`Validator`]: a plain verdict, or messages where none means valid.
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationResult {
    Bool(bool),
    Messages(Vec<Message>),
}

impl From<bool> for ValidationResult {
    fn from(valid: bool) -> Self {
        Self::Bool(valid)
    }
}

impl From<Vec<Message>> for ValidationResult {
    fn from(messages: Vec<Message>) -> Self {
        Self::Messages(messages)
    }
}

impl From<Message> for ValidationResult {
    fn from(message: Message) -> Self {
        Self::Messages(vec![message])
    }
}

/// Checks an entity, see [`Record::validate`].
pub trait Validator {
    fn validate(&self, record: &dyn Record) -> ValidationResult;
}

impl<F, R> Validator for F
where
    F: Fn(&dyn Record) -> R,
    R: Into<ValidationResult>,
{
    fn validate(&self, record: &dyn Record) -> ValidationResult {
        self(record).into()
    }
}
