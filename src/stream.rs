//! Lazily decoded result streams.

use std::sync::Arc;

use crate::codec::{self, Codec};
use crate::driver::RowSource;
use crate::error::{DbError, DbResult};
use crate::types::{Record, RecordType};

/// Resolve the decoder for every field of a result record type. Resolution
/// happens before any query is issued, so an unsupported field type fails
/// the whole operation up front.
pub(crate) fn field_codecs(record: &RecordType) -> DbResult<Vec<(String, Arc<Codec>)>> {
    record
        .fields
        .iter()
        .map(|field| Ok((field.name.clone(), codec::resolve(&field.ty)?)))
        .collect()
}

/// Pull-based stream of query results, decoding one row at a time.
///
/// Rows are materialized only as they are pulled. Dropping the stream
/// before exhaustion abandons the remaining rows without error.
pub struct RowStream<R: RowSource> {
    record: RecordType,
    codecs: Vec<(String, Arc<Codec>)>,
    rows: R,
}

impl<R: RowSource> std::fmt::Debug for RowStream<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream")
            .field("record", &self.record.name)
            .field("fields", &self.codecs.len())
            .finish()
    }
}

impl<R: RowSource> RowStream<R> {
    pub fn new(record: RecordType, rows: R) -> DbResult<Self> {
        let codecs = field_codecs(&record)?;
        Ok(Self::from_parts(record, codecs, rows))
    }

    pub(crate) fn from_parts(
        record: RecordType,
        codecs: Vec<(String, Arc<Codec>)>,
        rows: R,
    ) -> Self {
        Self {
            record,
            codecs,
            rows,
        }
    }

    /// Pull and decode the next row. `Ok(None)` marks exhaustion. A decode
    /// failure reports the offending field name.
    pub async fn try_next(&mut self) -> DbResult<Option<Record>> {
        let Some(row) = self.rows.next_row().await? else {
            return Ok(None);
        };
        let mut fields = Vec::with_capacity(self.codecs.len());
        for (name, codec) in &self.codecs {
            let raw = row
                .get(name)
                .ok_or_else(|| {
                    DbError::decode("<missing>", "column absent from row")
                        .for_field(name.clone())
                })?;
            let decoded = codec.decode(raw).map_err(|e| e.for_field(name.clone()))?;
            fields.push((name.clone(), decoded));
        }
        Ok(Some(Record::new(self.record.name.clone(), fields)))
    }
}
