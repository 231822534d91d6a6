//! Codec resolution.
//!
//! A [`Codec`] converts between an application value and the driver value for
//! one wire type. [`resolve`] walks a fixed chain of five providers and
//! memoizes the first match per type descriptor:
//!
//! 1. pass-through scalars (exact table, subtype-aware)
//! 2. homogeneous sequences
//! 3. optional/union types
//! 4. literal-enum types
//! 5. structured-document (`jsonb`) catch-all
//!
//! The order is a correctness invariant: a descriptor must reach the first
//! provider that can serve it, not merely any provider that could.

pub(crate) mod document;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use serde_json::Value as JsonValue;

use crate::error::{DbError, DbResult};
use crate::types::{ScalarKind, TypeDescriptor, Value};

type ConvertFn = Box<dyn Fn(&Value) -> DbResult<Value> + Send + Sync>;

/// A bidirectional converter between an application value and a driver value,
/// paired with the wire type name it targets. Stateless after construction;
/// shared as `Arc<Codec>` once cached.
pub struct Codec {
    descriptor: TypeDescriptor,
    sql_type: String,
    encode: ConvertFn,
    decode: ConvertFn,
}

impl Codec {
    fn new(
        descriptor: TypeDescriptor,
        sql_type: impl Into<String>,
        encode: ConvertFn,
        decode: ConvertFn,
    ) -> Self {
        Self {
            descriptor,
            sql_type: sql_type.into(),
            encode,
            decode,
        }
    }

    /// The type descriptor this codec serves.
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// The wire type name, e.g. `bigint` or `text[]`.
    pub fn sql_type(&self) -> &str {
        &self.sql_type
    }

    /// Encode an application value to a driver value.
    pub fn encode(&self, value: &Value) -> DbResult<Value> {
        (self.encode)(value)
    }

    /// Decode a driver value back to an application value.
    pub fn decode(&self, value: &Value) -> DbResult<Value> {
        (self.decode)(value)
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("descriptor", &self.descriptor)
            .field("sql_type", &self.sql_type)
            .finish()
    }
}

/// Process-wide append-only cache. Providers are pure functions of the
/// descriptor, so concurrent first-time resolution may compute redundantly;
/// the first insertion wins and every caller sees an equivalent codec.
static CODECS: Lazy<RwLock<HashMap<TypeDescriptor, Arc<Codec>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Return a codec compatible with the given type descriptor.
pub fn resolve(ty: &TypeDescriptor) -> DbResult<Arc<Codec>> {
    {
        let cache = CODECS
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(codec) = cache.get(ty) {
            return Ok(codec.clone());
        }
    }
    let codec = Arc::new(provide(ty)?);
    let mut cache = CODECS
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    Ok(cache.entry(ty.clone()).or_insert(codec).clone())
}

type Provider = fn(&TypeDescriptor) -> DbResult<Option<Codec>>;

// order is significant
const PROVIDERS: &[Provider] = &[
    pass_provider,
    sequence_provider,
    union_provider,
    literal_provider,
    jsonb_provider,
];

fn provide(ty: &TypeDescriptor) -> DbResult<Codec> {
    for provider in PROVIDERS {
        if let Some(codec) = provider(ty)? {
            return Ok(codec);
        }
    }
    Err(DbError::unsupported_type(ty.to_string()))
}

// =============================================================================
// 1. Pass-through scalars
// =============================================================================

const PASS_TABLE: &[(ScalarKind, &str)] = &[
    (ScalarKind::Text, "text"),
    (ScalarKind::Bool, "boolean"),
    (ScalarKind::Int, "bigint"),
    (ScalarKind::Float, "double precision"),
    (ScalarKind::Bytes, "bytea"),
    (ScalarKind::ByteBuf, "bytea"),
    (ScalarKind::Uuid, "uuid"),
    (ScalarKind::Decimal, "numeric"),
    (ScalarKind::Timestamp, "timestamp with time zone"),
    (ScalarKind::Date, "date"),
];

/// A newtype over a pass-through scalar resolves to the base kind's codec.
fn pass_kind(ty: &TypeDescriptor) -> Option<ScalarKind> {
    match ty {
        TypeDescriptor::Scalar(kind) => Some(*kind),
        TypeDescriptor::Newtype { base, .. } => pass_kind(base),
        _ => None,
    }
}

fn pass_provider(ty: &TypeDescriptor) -> DbResult<Option<Codec>> {
    let Some(kind) = pass_kind(ty) else {
        return Ok(None);
    };
    let Some((_, sql_type)) = PASS_TABLE.iter().find(|(k, _)| *k == kind) else {
        return Ok(None);
    };
    let encode_type = sql_type.to_string();
    let encode: ConvertFn = Box::new(move |value| {
        if kind.matches(value) {
            Ok(value.clone())
        } else {
            Err(DbError::encode(
                encode_type.clone(),
                format!("expected {}, got {}", kind.name(), value.type_name()),
            ))
        }
    });
    let decode: ConvertFn = Box::new(move |value| {
        if kind.matches(value) {
            Ok(value.clone())
        } else {
            Err(DbError::decode(
                format!("{value:?}"),
                format!("expected {}", kind.name()),
            ))
        }
    });
    Ok(Some(Codec::new(ty.clone(), *sql_type, encode, decode)))
}

// =============================================================================
// 2. Homogeneous sequences
// =============================================================================

fn sequence_provider(ty: &TypeDescriptor) -> DbResult<Option<Codec>> {
    let TypeDescriptor::Sequence { container, args } = ty else {
        return Ok(None);
    };
    // containers with zero or more than one type argument fall through
    if args.len() != 1 {
        return Ok(None);
    }
    let element = resolve(&args[0])?;
    let sql_type = format!("{}[]", element.sql_type());
    let container = *container;

    let encode_element = element.clone();
    let encode_type = sql_type.clone();
    let encode: ConvertFn = Box::new(move |value| {
        let Value::Array(items) = value else {
            return Err(DbError::encode(
                encode_type.clone(),
                format!("expected array, got {}", value.type_name()),
            ));
        };
        let encoded = items
            .iter()
            .map(|item| encode_element.encode(item))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Value::Array(encoded))
    });

    let decode_element = element;
    let decode: ConvertFn = Box::new(move |value| {
        let Value::Array(items) = value else {
            return Err(DbError::decode(format!("{value:?}"), "expected array"));
        };
        let decoded = items
            .iter()
            .map(|item| decode_element.decode(item))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(container.rebuild(decoded))
    });

    Ok(Some(Codec::new(ty.clone(), sql_type, encode, decode)))
}

// =============================================================================
// 3. Optional / union
// =============================================================================

fn union_provider(ty: &TypeDescriptor) -> DbResult<Option<Codec>> {
    let TypeDescriptor::Union(members) = ty else {
        return Ok(None);
    };
    let non_none: Vec<&TypeDescriptor> = members
        .iter()
        .filter(|member| !matches!(member, TypeDescriptor::None))
        .collect();
    let nullable = non_none.len() != members.len();

    if non_none.len() != 1 {
        // multi-member (or none-only) unions delegate entirely to the
        // document fallback for the original descriptor
        return jsonb_provider(ty);
    }

    let inner = resolve(non_none[0])?;
    let sql_type = inner.sql_type().to_string();

    let encode_inner = inner.clone();
    let encode: ConvertFn = Box::new(move |value| {
        if value.is_null() && nullable {
            Ok(Value::Null)
        } else {
            encode_inner.encode(value)
        }
    });

    let decode_inner = inner;
    let decode: ConvertFn = Box::new(move |value| {
        if value.is_null() && nullable {
            Ok(Value::Null)
        } else {
            decode_inner.decode(value)
        }
    });

    Ok(Some(Codec::new(ty.clone(), sql_type, encode, decode)))
}

// =============================================================================
// 4. Literal enums
// =============================================================================

/// Resolves the deduplicated union of the constants' own value kinds and
/// delegates entirely to that codec.
fn literal_provider(ty: &TypeDescriptor) -> DbResult<Option<Codec>> {
    let TypeDescriptor::Literal(constants) = ty else {
        return Ok(None);
    };
    if constants.is_empty() {
        return Ok(None);
    }
    let mut member_types: Vec<TypeDescriptor> = Vec::new();
    for constant in constants {
        let member = TypeDescriptor::Scalar(constant.kind());
        if !member_types.contains(&member) {
            member_types.push(member);
        }
    }
    let delegate = resolve(&TypeDescriptor::Union(member_types))?;
    let sql_type = delegate.sql_type().to_string();

    let encode_delegate = delegate.clone();
    let encode: ConvertFn = Box::new(move |value| encode_delegate.encode(value));
    let decode_delegate = delegate;
    let decode: ConvertFn = Box::new(move |value| decode_delegate.decode(value));

    Ok(Some(Codec::new(ty.clone(), sql_type, encode, decode)))
}

// =============================================================================
// 5. Structured-document catch-all
// =============================================================================

/// Serializes the value as a canonical JSON text for the wire type `jsonb`.
/// Must remain the last provider in the chain.
fn jsonb_provider(ty: &TypeDescriptor) -> DbResult<Option<Codec>> {
    let doc = Arc::new(document::codec_for(ty)?);

    let encode_doc = doc.clone();
    let encode: ConvertFn = Box::new(move |value| {
        let tree = encode_doc.encode(value)?;
        let text = serde_json::to_string(&tree)
            .map_err(|e| DbError::encode("jsonb", e.to_string()))?;
        Ok(Value::Text(text))
    });

    let decode: ConvertFn = Box::new(move |value| {
        let tree: JsonValue = match value {
            Value::Text(s) => serde_json::from_str(s)
                .map_err(|e| DbError::decode(s.clone(), format!("invalid json: {e}")))?,
            Value::Json(v) => v.clone(),
            Value::Null => JsonValue::Null,
            other => {
                return Err(DbError::decode(
                    format!("{other:?}"),
                    "expected jsonb text",
                ));
            }
        };
        doc.decode(&tree)
    });

    Ok(Some(Codec::new(ty.clone(), "jsonb", encode, decode)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContainerKind, LiteralValue};

    fn scalar(kind: ScalarKind) -> TypeDescriptor {
        TypeDescriptor::Scalar(kind)
    }

    #[test]
    fn test_pass_table_wire_types() {
        for (kind, sql_type) in [
            (ScalarKind::Text, "text"),
            (ScalarKind::Bool, "boolean"),
            (ScalarKind::Int, "bigint"),
            (ScalarKind::Float, "double precision"),
            (ScalarKind::Bytes, "bytea"),
            (ScalarKind::ByteBuf, "bytea"),
            (ScalarKind::Uuid, "uuid"),
            (ScalarKind::Decimal, "numeric"),
            (ScalarKind::Timestamp, "timestamp with time zone"),
            (ScalarKind::Date, "date"),
        ] {
            let codec = resolve(&scalar(kind)).unwrap();
            assert_eq!(codec.sql_type(), sql_type, "{}", kind.name());
        }
    }

    #[test]
    fn test_pass_roundtrip_boundary_values() {
        let cases = [
            (ScalarKind::Text, Value::Text(String::new())),
            (ScalarKind::Text, Value::Text("snack".to_string())),
            (ScalarKind::Int, Value::Int(0)),
            (ScalarKind::Int, Value::Int(i64::MIN)),
            (ScalarKind::Float, Value::Float(-2.5)),
            (ScalarKind::Bool, Value::Bool(false)),
            (ScalarKind::Bytes, Value::Bytes(Vec::new())),
            (
                ScalarKind::Decimal,
                Value::Decimal("-0.000000000000000000000000001".to_string()),
            ),
        ];
        for (kind, value) in cases {
            let codec = resolve(&scalar(kind)).unwrap();
            let encoded = codec.encode(&value).unwrap();
            assert_eq!(encoded, value);
            assert_eq!(codec.decode(&encoded).unwrap(), value);
        }
    }

    #[test]
    fn test_pass_encode_rejects_wrong_kind() {
        let codec = resolve(&scalar(ScalarKind::Int)).unwrap();
        let err = codec.encode(&Value::Text("1".to_string())).unwrap_err();
        assert!(matches!(err, DbError::Encode { .. }));
    }

    #[test]
    fn test_newtype_resolves_to_base_codec() {
        let user_id = TypeDescriptor::Newtype {
            name: "UserId".to_string(),
            base: Box::new(scalar(ScalarKind::Uuid)),
        };
        let codec = resolve(&user_id).unwrap();
        assert_eq!(codec.sql_type(), "uuid");

        // nested wrappers still reach the base kind
        let wrapped = TypeDescriptor::Newtype {
            name: "PrimaryKey".to_string(),
            base: Box::new(user_id),
        };
        assert_eq!(resolve(&wrapped).unwrap().sql_type(), "uuid");
    }

    #[test]
    fn test_resolution_determinism() {
        let ty = TypeDescriptor::optional(scalar(ScalarKind::Int));
        let first = resolve(&ty).unwrap();
        let second = resolve(&ty).unwrap();
        assert_eq!(first.sql_type(), second.sql_type());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_sequence_codec() {
        let ty = TypeDescriptor::list_of(scalar(ScalarKind::Int));
        let codec = resolve(&ty).unwrap();
        assert_eq!(codec.sql_type(), "bigint[]");

        let value = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let encoded = codec.encode(&value).unwrap();
        assert_eq!(encoded, value);
        assert_eq!(codec.decode(&encoded).unwrap(), value);
    }

    #[test]
    fn test_set_decode_deduplicates() {
        let ty = TypeDescriptor::set_of(scalar(ScalarKind::Text));
        let codec = resolve(&ty).unwrap();
        let raw = Value::Array(vec![
            Value::Text("foo".to_string()),
            Value::Text("bar".to_string()),
            Value::Text("foo".to_string()),
        ]);
        assert_eq!(
            codec.decode(&raw).unwrap(),
            Value::Array(vec![
                Value::Text("foo".to_string()),
                Value::Text("bar".to_string()),
            ])
        );
    }

    #[test]
    fn test_two_argument_container_falls_to_jsonb() {
        let ty = TypeDescriptor::Sequence {
            container: ContainerKind::List,
            args: vec![scalar(ScalarKind::Text), scalar(ScalarKind::Int)],
        };
        assert_eq!(resolve(&ty).unwrap().sql_type(), "jsonb");
    }

    #[test]
    fn test_zero_argument_container_unsupported() {
        let ty = TypeDescriptor::Sequence {
            container: ContainerKind::List,
            args: vec![],
        };
        assert!(matches!(
            resolve(&ty),
            Err(DbError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_optional_codec_nullability() {
        let ty = TypeDescriptor::optional(scalar(ScalarKind::Int));
        let codec = resolve(&ty).unwrap();
        assert_eq!(codec.sql_type(), "bigint");
        assert_eq!(codec.encode(&Value::Null).unwrap(), Value::Null);
        assert_eq!(codec.decode(&Value::Null).unwrap(), Value::Null);
        assert_eq!(codec.decode(&Value::Int(42)).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_non_nullable_union_rejects_null_encode() {
        let ty = TypeDescriptor::Union(vec![scalar(ScalarKind::Int)]);
        let codec = resolve(&ty).unwrap();
        assert!(codec.encode(&Value::Null).is_err());
    }

    #[test]
    fn test_union_fallback_roundtrips_each_member() {
        let ty = TypeDescriptor::Union(vec![
            scalar(ScalarKind::Int),
            scalar(ScalarKind::Text),
            scalar(ScalarKind::Bool),
        ]);
        let codec = resolve(&ty).unwrap();
        assert_eq!(codec.sql_type(), "jsonb");

        for value in [
            Value::Int(7),
            Value::Text("seven".to_string()),
            Value::Bool(true),
        ] {
            let encoded = codec.encode(&value).unwrap();
            assert!(matches!(encoded, Value::Text(_)));
            assert_eq!(codec.decode(&encoded).unwrap(), value);
        }
    }

    #[test]
    fn test_nullable_multi_union_encodes_none_through_fallback() {
        let ty = TypeDescriptor::Union(vec![
            scalar(ScalarKind::Int),
            scalar(ScalarKind::Text),
            TypeDescriptor::None,
        ]);
        let codec = resolve(&ty).unwrap();
        assert_eq!(codec.sql_type(), "jsonb");
        // the fallback codec decides representability of none
        assert_eq!(
            codec.encode(&Value::Null).unwrap(),
            Value::Text("null".to_string())
        );
        assert_eq!(
            codec.decode(&Value::Text("null".to_string())).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_literal_same_kind_uses_scalar_codec() {
        let ty = TypeDescriptor::Literal(vec![
            LiteralValue::Text("disable".to_string()),
            LiteralValue::Text("require".to_string()),
        ]);
        let codec = resolve(&ty).unwrap();
        assert_eq!(codec.sql_type(), "text");
        let value = Value::Text("require".to_string());
        assert_eq!(codec.encode(&value).unwrap(), value);
    }

    #[test]
    fn test_literal_mixed_kinds_uses_jsonb() {
        let ty = TypeDescriptor::Literal(vec![
            LiteralValue::Text("n/a".to_string()),
            LiteralValue::Int(0),
        ]);
        let codec = resolve(&ty).unwrap();
        assert_eq!(codec.sql_type(), "jsonb");
        let encoded = codec.encode(&Value::Int(0)).unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_any_roundtrips_opaque_document() {
        let codec = resolve(&TypeDescriptor::Any).unwrap();
        assert_eq!(codec.sql_type(), "jsonb");
        let value = Value::Json(serde_json::json!({"a": 1, "b": [true, null]}));
        let encoded = codec.encode(&value).unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), value);
    }
}
