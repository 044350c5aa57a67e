//! # Record Bridge
//!
//! Records are opaque, caller-owned payloads. The engine never copies,
//! mutates, or inspects them: it only extracts the 16-byte primary key
//! through [`Record::id`] and lets index key builders project indexed
//! fields out through their typed accessors.
//!
//! ## Ownership
//!
//! Records enter the engine as [`RecordRef`] (`Arc<dyn Record>`) and are
//! stored by reference in every index trie that accepts them. A record
//! inserted once may be reachable from many trie nodes across many
//! committed revisions and snapshots simultaneously, which is why the
//! shared-ownership handle must be a cheap atomic refcount.
//!
//! It is **unsound in the database sense** to mutate a record's indexed
//! fields after handing it in (interior mutability makes this expressible):
//! old snapshots still hold the record and would observe keys that no index
//! contains. Updating a record means inserting a fresh value under the same
//! identifier.
//!
//! ## Typed Access
//!
//! Queries hand back `RecordRef`s; callers recover their concrete type
//! with [`downcast_ref`](Record::downcast_ref), the safe replacement for
//! the pointer-juggling a reflection-based engine would need.

use std::any::Any;
use std::sync::Arc;

use crate::id::Id;

/// Shared handle to a stored record.
pub type RecordRef = Arc<dyn Record>;

/// The minimum surface a stored type must implement.
///
/// `id` yields the mandatory 16-byte primary key; everything else the
/// engine learns about a record goes through index key builders.
pub trait Record: Any + Send + Sync {
    /// The record's primary key.
    fn id(&self) -> Id;
}

impl dyn Record {
    /// Borrows the record as its concrete type, if it is one.
    pub fn downcast_ref<T: Record>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }

    /// The concrete type of the record, for schema checks.
    pub fn type_id_of(&self) -> std::any::TypeId {
        (self as &dyn Any).type_id()
    }
}

impl std::fmt::Debug for dyn Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record").field("id", &self.id()).finish()
    }
}
