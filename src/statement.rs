//! Statement boundary types.
//!
//! A [`Statement`] is an ordered sequence of fragments, each either literal
//! SQL text or a typed placeholder. It is produced by an external statement
//! builder and consumed read-only by the executor, which renders placeholders
//! as 1-based positional markers in emission order.

use crate::types::{RecordType, TypeDescriptor, Value};

/// A placeholder value together with its declared type. The declared type,
/// not the runtime value, selects the codec.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub value: Value,
    pub ty: TypeDescriptor,
}

impl TypedValue {
    pub fn new(value: Value, ty: TypeDescriptor) -> Self {
        Self { value, ty }
    }
}

/// One element of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Literal SQL text, emitted verbatim
    Text(String),
    /// A typed placeholder, rendered as a positional parameter marker
    Param(TypedValue),
}

/// An ordered sequence of fragments plus an optional result record type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    fragments: Vec<Fragment>,
    result: Option<RecordType>,
}

impl Statement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append literal SQL text.
    pub fn text(mut self, sql: impl Into<String>) -> Self {
        self.fragments.push(Fragment::Text(sql.into()));
        self
    }

    /// Append a typed placeholder.
    pub fn param(mut self, value: Value, ty: TypeDescriptor) -> Self {
        self.fragments.push(Fragment::Param(TypedValue::new(value, ty)));
        self
    }

    /// Declare the record type of returned rows. Statements without a result
    /// type execute for effect only.
    pub fn returning(mut self, record: RecordType) -> Self {
        self.result = Some(record);
        self
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn result(&self) -> Option<&RecordType> {
        self.result.as_ref()
    }
}
