//! Statement serialization and execution.

use tracing::debug;

use crate::codec;
use crate::driver::{Connection, Driver};
use crate::error::{DbError, DbResult};
use crate::session::Session;
use crate::statement::{Fragment, Statement};
use crate::stream::{self, RowStream};
use crate::types::Value;

/// Flatten a statement into SQL text with 1-based positional parameter
/// markers and the driver-level argument list, in fragment order. Each
/// parameter is encoded through the codec resolved for its declared type.
pub(crate) fn serialize(statement: &Statement) -> DbResult<(String, Vec<Value>)> {
    let mut text = String::new();
    let mut args = Vec::new();
    for fragment in statement.fragments() {
        match fragment {
            Fragment::Text(s) => text.push_str(s),
            Fragment::Param(param) => {
                let codec = codec::resolve(&param.ty)?;
                args.push(codec.encode(&param.value)?);
                text.push_str(&format!("${}", args.len()));
            }
        }
    }
    Ok((text, args))
}

impl<D: Driver> Session<'_, D> {
    /// Execute a statement within the active transaction.
    ///
    /// Fails with a usage error, without touching the database, when no
    /// transaction is active. Statements declaring a result type return a
    /// [`RowStream`]; all field codecs are resolved before the query is
    /// sent, so an unsupported field type fails before any round trip.
    pub async fn execute(
        &self,
        statement: &Statement,
    ) -> DbResult<Option<RowStream<<D::Conn as Connection>::Rows>>> {
        {
            let state = self.state.lock().await;
            if state.txn_id.is_none() {
                return Err(DbError::usage(
                    "transaction context required to execute statement",
                ));
            }
        }

        let (text, args) = serialize(statement)?;
        let codecs = statement
            .result()
            .map(stream::field_codecs)
            .transpose()?;

        debug!(sql = %text, params = args.len(), "execute");
        let mut state = self.state.lock().await;
        let conn = state
            .conn
            .as_mut()
            .ok_or_else(|| DbError::usage("connection context required"))?;
        match (statement.result(), codecs) {
            (Some(record), Some(codecs)) => {
                let rows = conn.cursor(&text, &args).await?;
                Ok(Some(RowStream::from_parts(record.clone(), codecs, rows)))
            }
            _ => {
                conn.execute(&text, &args).await?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::Statement;
    use crate::types::{ScalarKind, TypeDescriptor, Value};

    #[test]
    fn test_serialize_positional_markers() {
        let stmt = Statement::new()
            .text("SELECT a FROM t WHERE b = ")
            .param(
                Value::Int(3),
                TypeDescriptor::Scalar(ScalarKind::Int),
            )
            .text(" AND c = ")
            .param(
                Value::Text("x".into()),
                TypeDescriptor::Scalar(ScalarKind::Text),
            )
            .text(";");
        let (text, args) = serialize(&stmt).unwrap();
        assert_eq!(text, "SELECT a FROM t WHERE b = $1 AND c = $2;");
        assert_eq!(args, vec![Value::Int(3), Value::Text("x".into())]);
    }

    #[test]
    fn test_serialize_no_params() {
        let stmt = Statement::new().text("COMMIT;");
        let (text, args) = serialize(&stmt).unwrap();
        assert_eq!(text, "COMMIT;");
        assert!(args.is_empty());
    }
}
