//! # Uniqueness Marker
//!
//! Marks a sub-builder's index as unique: at most one record per emitted
//! key, enforced structurally (an insert under an existing key displaces
//! the previous record). The bytes are untouched; uniqueness changes how
//! the transaction layer stores and queries the key, not its encoding.
//!
//! Non-unique indexes get the record's primary key appended to the stored
//! key to keep trie entries distinct; unique indexes skip that suffix and
//! can answer a fully-specified lookup with a direct get.

use super::{next_index_id, Index};

/// Declares the sub-index unique.
pub fn unique(sub: Index) -> Index {
    Index {
        id: next_index_id(),
        entity: sub.entity,
        unique: true,
        indexer: sub.indexer,
    }
}
