//! Value and type-descriptor model.
//!
//! This module defines the dynamic value representation exchanged with the
//! driver and the structural type descriptors used as codec lookup keys.
//!
//! # Architecture
//!
//! Codec resolution is keyed by [`TypeDescriptor`], an immutable, hashable
//! description of an application value type. Values themselves travel as
//! [`Value`], a dynamic enum; pass-through codecs validate the kind and pass
//! the value unchanged, everything else is rewritten by its codec.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// A dynamic application-level (and driver-level) value.
///
/// Decimals are kept in their exact textual representation so that
/// round trips preserve full precision.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    Text(String),
    Bool(bool),
    /// Stored as i64 for maximum range
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    /// Exact textual representation of an arbitrary-precision number
    Decimal(String),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Array(Vec<Value>),
    /// Opaque structured document
    Json(serde_json::Value),
}

impl Value {
    /// Check if this value is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the kind name of this value for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bytes(_) => "bytes",
            Self::Uuid(_) => "uuid",
            Self::Decimal(_) => "decimal",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
            Self::Array(_) => "array",
            Self::Json(_) => "json",
        }
    }
}

/// Scalar kinds covered by the pass-through codec table.
///
/// `Bytes` and `ByteBuf` are two source representations of binary data that
/// map to the single wire type `bytea`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Text,
    Bool,
    Int,
    Float,
    Bytes,
    ByteBuf,
    Uuid,
    Decimal,
    Timestamp,
    Date,
}

impl ScalarKind {
    /// Whether a runtime value is an instance of this scalar kind.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Text, Value::Text(_)) => true,
            (Self::Bool, Value::Bool(_)) => true,
            (Self::Int, Value::Int(_)) => true,
            (Self::Float, Value::Float(_)) => true,
            (Self::Bytes | Self::ByteBuf, Value::Bytes(_)) => true,
            (Self::Uuid, Value::Uuid(_)) => true,
            (Self::Decimal, Value::Decimal(_)) => true,
            (Self::Timestamp, Value::Timestamp(_)) => true,
            (Self::Date, Value::Date(_)) => true,
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bytes => "bytes",
            Self::ByteBuf => "bytebuf",
            Self::Uuid => "uuid",
            Self::Decimal => "decimal",
            Self::Timestamp => "timestamp",
            Self::Date => "date",
        }
    }
}

/// The container kind of a parametrized sequence type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    List,
    Set,
}

impl ContainerKind {
    /// Rebuild a container value of this kind from decoded elements.
    /// Lists preserve order; sets deduplicate, keeping first occurrences.
    pub fn rebuild(&self, elements: Vec<Value>) -> Value {
        match self {
            Self::List => Value::Array(elements),
            Self::Set => {
                let mut unique: Vec<Value> = Vec::with_capacity(elements.len());
                for element in elements {
                    if !unique.contains(&element) {
                        unique.push(element);
                    }
                }
                Value::Array(unique)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Set => "set",
        }
    }
}

/// A constant in a literal-enum type. Restricted to kinds that can serve as
/// hashable descriptor keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl LiteralValue {
    /// The scalar kind of this constant's own runtime type.
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::Text(_) => ScalarKind::Text,
            Self::Int(_) => ScalarKind::Int,
            Self::Bool(_) => ScalarKind::Bool,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(s) => Value::Text(s.clone()),
            Self::Int(i) => Value::Int(*i),
            Self::Bool(b) => Value::Bool(*b),
        }
    }
}

/// Structural description of an application value type, used only as a codec
/// lookup key. Immutable, cheap to clone, hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    /// A built-in scalar kind
    Scalar(ScalarKind),
    /// A named structural subtype of another descriptor (typed wrapper)
    Newtype {
        name: String,
        base: Box<TypeDescriptor>,
    },
    /// A parametrized container; providers constrain the argument count
    Sequence {
        container: ContainerKind,
        args: Vec<TypeDescriptor>,
    },
    /// A union of member types; may include [`TypeDescriptor::None`]
    Union(Vec<TypeDescriptor>),
    /// A fixed set of constant values
    Literal(Vec<LiteralValue>),
    /// Opaque structured value, encoded as a document
    Any,
    /// The absent/none type
    None,
}

impl TypeDescriptor {
    /// Shorthand for `Union([inner, None])`.
    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::Union(vec![inner, Self::None])
    }

    /// Shorthand for a single-argument list descriptor.
    pub fn list_of(element: TypeDescriptor) -> Self {
        Self::Sequence {
            container: ContainerKind::List,
            args: vec![element],
        }
    }

    /// Shorthand for a single-argument set descriptor.
    pub fn set_of(element: TypeDescriptor) -> Self {
        Self::Sequence {
            container: ContainerKind::Set,
            args: vec![element],
        }
    }
}

impl std::fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{}", kind.name()),
            Self::Newtype { name, base } => write!(f, "{name}({base})"),
            Self::Sequence { container, args } => {
                write!(f, "{}[", container.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, "]")
            }
            Self::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
            Self::Literal(constants) => {
                write!(f, "literal[")?;
                for (i, constant) in constants.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match constant {
                        LiteralValue::Text(s) => write!(f, "{s:?}")?,
                        LiteralValue::Int(n) => write!(f, "{n}")?,
                        LiteralValue::Bool(b) => write!(f, "{b}")?,
                    }
                }
                write!(f, "]")
            }
            Self::Any => write!(f, "any"),
            Self::None => write!(f, "none"),
        }
    }
}

/// A named, typed field of a result record type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: TypeDescriptor,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// The declared shape of rows produced by a statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<Field>,
}

impl RecordType {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

/// One fully decoded row, with fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: String,
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(type_name: impl Into<String>, fields: Vec<(String, Value)>) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }
}
