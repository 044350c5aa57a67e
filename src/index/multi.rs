//! # Multi-Field Composite Indexes
//!
//! Concatenates the keys of an ordered list of sub-builders into one
//! compound key. Sizing and writing delegate component-wise; the argument
//! encoder list is the concatenation of the sub-builders' lists, so a
//! query against `multi([field(last), field(first)])` takes the last name
//! in position 0 and the first name in position 1, or just the last name,
//! which prefix-scans everyone sharing it.
//!
//! A record is excluded from the composite as soon as any component
//! excludes it (a conditional sub-builder reporting zero bytes drops the
//! whole record, not just its component).

use std::sync::Arc;

use eyre::Result;

use super::{next_index_id, ArgEncoder, Index, Indexer};
use crate::record::Record;

/// Declares an index concatenating the given sub-indexes, in order.
///
/// Panics when `subs` is empty or the sub-indexes disagree on the entity
/// type: both are schema-definition errors.
pub fn multi(subs: impl IntoIterator<Item = Index>) -> Index {
    let subs: Vec<Index> = subs.into_iter().collect();
    let Some(first) = subs.first() else {
        panic!("multi index needs at least one sub-index");
    };
    let entity = first.entity;
    for sub in &subs {
        assert!(
            sub.entity == entity,
            "multi index mixes entity types across sub-indexes"
        );
    }

    let args: Vec<Arc<dyn ArgEncoder>> = subs
        .iter()
        .flat_map(|sub| sub.indexer.args().iter().cloned())
        .collect();

    Index {
        id: next_index_id(),
        entity,
        unique: false,
        indexer: Arc::new(MultiIndexer {
            subs: subs.into_iter().map(|sub| sub.indexer).collect(),
            args,
        }),
    }
}

struct MultiIndexer {
    subs: Vec<Arc<dyn Indexer>>,
    args: Vec<Arc<dyn ArgEncoder>>,
}

impl Indexer for MultiIndexer {
    fn size_from_record(&self, record: &dyn Record) -> Result<usize> {
        let mut size = 0;
        for sub in &self.subs {
            let part = sub.size_from_record(record)?;
            if part == 0 {
                return Ok(0);
            }
            size += part;
        }
        Ok(size)
    }

    fn write_from_record(&self, buf: &mut [u8], record: &dyn Record) -> Result<usize> {
        let mut written = 0;
        for sub in &self.subs {
            written += sub.write_from_record(&mut buf[written..], record)?;
        }
        Ok(written)
    }

    fn args(&self) -> &[Arc<dyn ArgEncoder>] {
        &self.args
    }
}
