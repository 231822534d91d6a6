//! Structured-document codec boundary.
//!
//! The catch-all `jsonb` codec delegates here: a [`DocumentCodec`] converts
//! between a [`Value`] and a JSON document tree, directed by the type
//! descriptor on the decode side. Binary values are carried as base64 text
//! inside documents; timestamps as RFC 3339; dates as ISO 8601.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::types::{ScalarKind, TypeDescriptor, Value};

/// Document converter for one type descriptor.
pub(crate) struct DocumentCodec {
    descriptor: TypeDescriptor,
}

/// Obtain a document codec for a descriptor, or fail with
/// `UnsupportedType` if the descriptor cannot be represented as a document
/// (e.g. a container with no type arguments).
pub(crate) fn codec_for(descriptor: &TypeDescriptor) -> DbResult<DocumentCodec> {
    check(descriptor)?;
    Ok(DocumentCodec {
        descriptor: descriptor.clone(),
    })
}

fn check(ty: &TypeDescriptor) -> DbResult<()> {
    match ty {
        TypeDescriptor::Sequence { args, .. } => {
            if args.is_empty() {
                return Err(DbError::unsupported_type(ty.to_string()));
            }
            args.iter().try_for_each(check)
        }
        TypeDescriptor::Union(members) => members.iter().try_for_each(check),
        TypeDescriptor::Newtype { base, .. } => check(base),
        _ => Ok(()),
    }
}

impl DocumentCodec {
    pub fn encode(&self, value: &Value) -> DbResult<JsonValue> {
        encode_value(value)
    }

    pub fn decode(&self, doc: &JsonValue) -> DbResult<Value> {
        decode_value(&self.descriptor, doc)
    }
}

/// Encoding is structural: the value alone determines its document form.
fn encode_value(value: &Value) -> DbResult<JsonValue> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(n) => JsonValue::Number((*n).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .ok_or_else(|| DbError::encode("jsonb", format!("non-finite float {f}")))?,
        Value::Bytes(b) => JsonValue::String(STANDARD.encode(b)),
        Value::Uuid(u) => JsonValue::String(u.to_string()),
        Value::Decimal(d) => JsonValue::String(d.clone()),
        Value::Timestamp(ts) => JsonValue::String(ts.to_rfc3339()),
        Value::Date(d) => JsonValue::String(d.to_string()),
        Value::Array(items) => {
            JsonValue::Array(items.iter().map(encode_value).collect::<DbResult<_>>()?)
        }
        Value::Json(v) => v.clone(),
    })
}

/// Decoding re-materializes the application type from the document tree.
fn decode_value(ty: &TypeDescriptor, doc: &JsonValue) -> DbResult<Value> {
    match ty {
        TypeDescriptor::Scalar(kind) => decode_scalar(*kind, doc),
        TypeDescriptor::Newtype { base, .. } => decode_value(base, doc),
        TypeDescriptor::Sequence { container, args } => {
            let JsonValue::Array(items) = doc else {
                return Err(DbError::decode(doc.to_string(), "expected an array"));
            };
            if args.len() == 1 {
                let elements = items
                    .iter()
                    .map(|item| decode_value(&args[0], item))
                    .collect::<DbResult<Vec<_>>>()?;
                Ok(container.rebuild(elements))
            } else {
                // tuple-like container: one descriptor per position
                if items.len() != args.len() {
                    return Err(DbError::decode(
                        doc.to_string(),
                        format!("expected {} elements, got {}", args.len(), items.len()),
                    ));
                }
                let elements = args
                    .iter()
                    .zip(items)
                    .map(|(arg, item)| decode_value(arg, item))
                    .collect::<DbResult<Vec<_>>>()?;
                Ok(Value::Array(elements))
            }
        }
        TypeDescriptor::Union(members) => {
            if doc.is_null() && members.contains(&TypeDescriptor::None) {
                return Ok(Value::Null);
            }
            for member in members {
                if matches!(member, TypeDescriptor::None) {
                    continue;
                }
                if let Ok(value) = decode_value(member, doc) {
                    return Ok(value);
                }
            }
            Err(DbError::decode(
                doc.to_string(),
                format!("no member of {ty} matched"),
            ))
        }
        TypeDescriptor::Literal(constants) => {
            for constant in constants {
                if let Ok(value) = decode_scalar(constant.kind(), doc) {
                    if value == constant.to_value() {
                        return Ok(value);
                    }
                }
            }
            Err(DbError::decode(
                doc.to_string(),
                format!("not a permitted value of {ty}"),
            ))
        }
        TypeDescriptor::Any => Ok(Value::Json(doc.clone())),
        TypeDescriptor::None => {
            if doc.is_null() {
                Ok(Value::Null)
            } else {
                Err(DbError::decode(doc.to_string(), "expected null"))
            }
        }
    }
}

fn decode_scalar(kind: ScalarKind, doc: &JsonValue) -> DbResult<Value> {
    let mismatch = || DbError::decode(doc.to_string(), format!("expected {}", kind.name()));
    match kind {
        ScalarKind::Text => doc
            .as_str()
            .map(|s| Value::Text(s.to_string()))
            .ok_or_else(mismatch),
        ScalarKind::Bool => doc.as_bool().map(Value::Bool).ok_or_else(mismatch),
        ScalarKind::Int => doc.as_i64().map(Value::Int).ok_or_else(mismatch),
        ScalarKind::Float => doc.as_f64().map(Value::Float).ok_or_else(mismatch),
        ScalarKind::Bytes | ScalarKind::ByteBuf => {
            let s = doc.as_str().ok_or_else(mismatch)?;
            STANDARD
                .decode(s)
                .map(Value::Bytes)
                .map_err(|e| DbError::decode(doc.to_string(), format!("invalid base64: {e}")))
        }
        ScalarKind::Uuid => {
            let s = doc.as_str().ok_or_else(mismatch)?;
            Uuid::parse_str(s)
                .map(Value::Uuid)
                .map_err(|e| DbError::decode(doc.to_string(), format!("invalid uuid: {e}")))
        }
        ScalarKind::Decimal => match doc {
            JsonValue::String(s) => Ok(Value::Decimal(s.clone())),
            JsonValue::Number(n) => Ok(Value::Decimal(n.to_string())),
            _ => Err(mismatch()),
        },
        ScalarKind::Timestamp => {
            let s = doc.as_str().ok_or_else(mismatch)?;
            DateTime::parse_from_rfc3339(s)
                .map(|ts| Value::Timestamp(ts.with_timezone(&Utc)))
                .map_err(|e| DbError::decode(doc.to_string(), format!("invalid timestamp: {e}")))
        }
        ScalarKind::Date => {
            let s = doc.as_str().ok_or_else(mismatch)?;
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| DbError::decode(doc.to_string(), format!("invalid date: {e}")))
        }
    }
}
