//! # Database Façade
//!
//! [`Db`] owns the three pieces of shared state the whole engine runs on:
//!
//! - the validated, immutable [`DbSchema`];
//! - the committed directory pointer: one `Arc<Directory>` behind a
//!   lock that guards nothing but the pointer load and store;
//! - the writer mutex, serializing write transactions.
//!
//! ## Concurrency
//!
//! Any number of read transactions run at once; each captures the
//! directory pointer when it starts and never looks at shared state
//! again. At most one write transaction exists at a time: `txn(true)`
//! blocks on the writer mutex, and commit publishes the writer's
//! directory version with a single pointer store before the lock is
//! released. Readers are never blocked; the pointer lock is held for the
//! duration of a load or a store, never across user work.
//!
//! ## Snapshots
//!
//! `snapshot` clones the façade around the current directory pointer: a
//! new database sharing every trie node with this one, with its own
//! writer lock. Writes on either side are invisible to the other: the
//! tries are immutable, so the two databases diverge structurally from
//! the shared revision without copying it.
//!
//! ```no_run
//! use mossdb::{index, Arg, Db, Id, Record};
//!
//! struct User {
//!     id: Id,
//!     name: String,
//! }
//!
//! impl Record for User {
//!     fn id(&self) -> Id {
//!         self.id
//!     }
//! }
//!
//! # fn main() -> eyre::Result<()> {
//! let by_name = index::field(|u: &User| &u.name);
//! let name_index = by_name.id();
//! let db = Db::open(vec![vec![by_name]])?;
//!
//! let mut txn = db.txn(true);
//! txn.insert(0, std::sync::Arc::new(User { id: Id::random(), name: "ada".into() }))?;
//! txn.commit();
//!
//! let reader = db.txn(false);
//! let found = reader.first(0, name_index, &[Arg::Str("ada")])?;
//! assert!(found.is_some());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use eyre::Result;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::directory::Directory;
use crate::index::Index;
use crate::record::RecordRef;
use crate::schema::DbSchema;
use crate::trie::Tree;
use crate::txn::Txn;

/// The trie handle stored per directory slot.
pub(crate) type IndexTree = Tree<RecordRef>;

/// An in-memory multi-version database.
pub struct Db {
    pub(crate) schema: Arc<DbSchema>,
    root: RwLock<Arc<Directory<IndexTree>>>,
    writer: Mutex<()>,
}

impl Db {
    /// Validates the schema and constructs an empty database.
    ///
    /// The outer list is indexed by table id (0..n-1); each inner list
    /// declares that table's secondary indexes. The primary index is
    /// implicit on every table.
    pub fn open(tables: Vec<Vec<Index>>) -> Result<Db> {
        let schema = DbSchema::build(tables)?;

        let mut directory = Directory::new();
        for slot in schema.slots() {
            directory.set(slot, Tree::new());
        }

        debug!(tables = schema.len(), "database opened");
        Ok(Db {
            schema: Arc::new(schema),
            root: RwLock::new(Arc::new(directory)),
            writer: Mutex::new(()),
        })
    }

    /// Starts a transaction.
    ///
    /// A write transaction blocks here until it is the only writer; read
    /// transactions never block and never observe later commits.
    pub fn txn(&self, write: bool) -> Txn<'_> {
        if write {
            let guard = self.writer.lock();
            Txn::new_write(self, guard)
        } else {
            Txn::new_read(self)
        }
    }

    /// Captures a point-in-time snapshot as an independent database.
    ///
    /// The snapshot shares all storage with this database at the current
    /// revision; writes to either are invisible to the other. Records are
    /// shared by reference on both sides, so the no-mutation rule spans
    /// snapshots too.
    pub fn snapshot(&self) -> Db {
        Db {
            schema: self.schema.clone(),
            root: RwLock::new(self.current()),
            writer: Mutex::new(()),
        }
    }

    /// Blocks until any in-flight write transaction commits or aborts.
    pub fn await_writer(&self) {
        drop(self.writer.lock());
    }

    /// Read-only schema introspection.
    pub fn schema(&self) -> &DbSchema {
        &self.schema
    }

    /// The committed directory pointer, captured atomically.
    pub(crate) fn current(&self) -> Arc<Directory<IndexTree>> {
        self.root.read().clone()
    }

    /// Atomically installs a new committed directory.
    pub(crate) fn publish(&self, directory: Arc<Directory<IndexTree>>) {
        *self.root.write() = directory;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Id;
    use crate::index::field;
    use crate::record::Record;

    struct Item {
        id: Id,
        label: String,
    }

    impl Record for Item {
        fn id(&self) -> Id {
            self.id
        }
    }

    fn item(id_byte: u8, label: &str) -> RecordRef {
        let mut bytes = [0u8; 16];
        bytes[15] = id_byte;
        Arc::new(Item {
            id: Id(bytes),
            label: label.to_string(),
        })
    }

    #[test]
    fn open_rejects_empty_schema() {
        assert!(Db::open(vec![]).is_err());
    }

    #[test]
    fn open_builds_one_trie_per_index() {
        let db = Db::open(vec![vec![field(|i: &Item| &i.label)], vec![]]).unwrap();
        let directory = db.current();
        for slot in db.schema.slots() {
            assert!(directory.get(slot).is_some(), "slot {} missing", slot);
        }
    }

    #[test]
    fn snapshot_shares_current_state() {
        let db = Db::open(vec![vec![]]).unwrap();
        let mut txn = db.txn(true);
        txn.insert(0, item(1, "before")).unwrap();
        txn.commit();

        let snap = db.snapshot();
        let reader = snap.txn(false);
        let found = reader
            .first(0, crate::id::ID_INDEX_ID, &[crate::index::Arg::Id(item(1, "x").id())])
            .unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn schema_accessor_exposes_tables() {
        let db = Db::open(vec![vec![], vec![]]).unwrap();
        assert_eq!(db.schema().len(), 2);
    }
}
