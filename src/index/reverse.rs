//! # Order-Reversing Indexes
//!
//! Inverts every bit of the sub-builder's output, on both the record side
//! and the argument side. Bit inversion is an involution that keeps
//! distinct keys distinct and exactly inverts bytewise order, so the index
//! stores the same entries as its sub-builder but iterates them in the
//! opposite domain order, "newest first" without a descending scan.
//!
//! When the sub-builder is a composite, the whole concatenated buffer is
//! flipped in one pass. Because inversion is bytewise, this equals
//! flipping each component individually: the practical consequence is that
//! the seek order of *every* component reverses at once. There is no way
//! to reverse only one component of a composite with this wrapper (nest
//! the wrapper around the one component instead).
//!
//! The unique flag of the sub-builder is preserved: inversion cannot make
//! two distinct keys collide.

use std::sync::Arc;

use eyre::Result;

use super::{next_index_id, Arg, ArgEncoder, Index, Indexer};
use crate::bits;
use crate::record::Record;

/// Declares an index storing the sub-index's keys with every bit flipped.
pub fn reverse(sub: Index) -> Index {
    let args: Vec<Arc<dyn ArgEncoder>> = sub
        .indexer
        .args()
        .iter()
        .map(|inner| Arc::new(ReverseArg {
            inner: inner.clone(),
        }) as Arc<dyn ArgEncoder>)
        .collect();

    Index {
        id: next_index_id(),
        entity: sub.entity,
        unique: sub.unique,
        indexer: Arc::new(ReverseIndexer {
            sub: sub.indexer,
            args,
        }),
    }
}

struct ReverseIndexer {
    sub: Arc<dyn Indexer>,
    args: Vec<Arc<dyn ArgEncoder>>,
}

impl Indexer for ReverseIndexer {
    fn size_from_record(&self, record: &dyn Record) -> Result<usize> {
        self.sub.size_from_record(record)
    }

    fn write_from_record(&self, buf: &mut [u8], record: &dyn Record) -> Result<usize> {
        let written = self.sub.write_from_record(buf, record)?;
        bits::negate(&mut buf[..written]);
        Ok(written)
    }

    fn args(&self) -> &[Arc<dyn ArgEncoder>] {
        &self.args
    }
}

struct ReverseArg {
    inner: Arc<dyn ArgEncoder>,
}

impl ArgEncoder for ReverseArg {
    fn size_from_arg(&self, arg: &Arg<'_>) -> Result<usize> {
        self.inner.size_from_arg(arg)
    }

    fn write_from_arg(&self, buf: &mut [u8], arg: &Arg<'_>) -> Result<usize> {
        let written = self.inner.write_from_arg(buf, arg)?;
        bits::negate(&mut buf[..written]);
        Ok(written)
    }
}
