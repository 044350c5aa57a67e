//! # Conditional Indexes
//!
//! Gates a sub-builder with a predicate over the record: when the
//! predicate rejects a record, the builder reports a zero-byte key and the
//! record is simply absent from this index. Queries pass through to the
//! sub-builder unchanged: the predicate restricts what is stored, not
//! what can be asked.
//!
//! Partial indexes fall out of this directly: `filtered(field(expires_at),
//! |s: &Session| s.active)` indexes only live sessions, and scanning it
//! never touches the dead ones.

use std::any::TypeId;
use std::sync::Arc;

use eyre::Result;

use super::{next_index_id, record_as, ArgEncoder, Index, Indexer};
use crate::record::Record;

/// Declares an index containing only the records `predicate` accepts.
///
/// Panics when the predicate's entity type differs from the sub-index's:
/// a schema-definition error.
pub fn filtered<T>(sub: Index, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Index
where
    T: Record,
{
    assert!(
        TypeId::of::<T>() == sub.entity,
        "predicate entity type differs from the sub-index entity type"
    );
    Index {
        id: next_index_id(),
        entity: sub.entity,
        unique: false,
        indexer: Arc::new(FilteredIndexer::<T> {
            sub: sub.indexer,
            predicate: Box::new(predicate),
        }),
    }
}

struct FilteredIndexer<T> {
    sub: Arc<dyn Indexer>,
    predicate: Box<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T: Record> Indexer for FilteredIndexer<T> {
    fn size_from_record(&self, record: &dyn Record) -> Result<usize> {
        if !(self.predicate)(record_as::<T>(record)?) {
            return Ok(0);
        }
        self.sub.size_from_record(record)
    }

    fn write_from_record(&self, buf: &mut [u8], record: &dyn Record) -> Result<usize> {
        if !(self.predicate)(record_as::<T>(record)?) {
            return Ok(0);
        }
        self.sub.write_from_record(buf, record)
    }

    fn args(&self) -> &[Arc<dyn ArgEncoder>] {
        self.sub.args()
    }
}
