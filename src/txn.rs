//! # Transactions
//!
//! A [`Txn`] is a read or write session against one database. Its view of
//! the world is the directory version captured when it started: readers
//! share the committed directory as-is, a writer gets the directory's next
//! version and lays per-index trie overlays into it as it modifies slots.
//!
//! ## Write Path
//!
//! `insert` computes the record's primary key, installs the record in the
//! primary trie (capturing the displaced record, if any), then walks every
//! other index of the table:
//!
//! 1. ask the key builder for the emitted key size; zero means the
//!    conditional rule excludes this record, skip the index;
//! 2. for non-unique indexes, append the 16-byte primary key to the
//!    emitted bytes, which keeps colliding emissions distinct in the trie
//!    while preserving their order under the emitted key;
//! 3. on update, compute the displaced record's key under the same index
//!    and delete it first, unless it is byte-identical to the new key, in
//!    which case the insert below overwrites it anyway;
//! 4. insert the new key.
//!
//! `delete` is symmetric and driven by the displaced record: the primary
//! trie is cleared first ([`NotFound`] when the key is absent, leaving the
//! other indexes untouched), then every secondary key the *previous*
//! record emitted is removed.
//!
//! ## Queries
//!
//! `first` and `iter` take the index's flattened argument list. Any prefix
//! of the list may be supplied; two positional operators refine the scan:
//!
//! - [`Arg::From`] splits the arguments into an exact-prefix portion and a
//!   lower-bound portion seeking inside that prefix;
//! - a trailing [`Arg::Back`]`(n)` rewinds the produced iterator n
//!   positions.
//!
//! A fully-specified, operator-free lookup against a unique index
//! collapses to a direct trie get.
//!
//! ## Lifecycle
//!
//! Active → committed or aborted, once; `commit` and `abort` on a
//! finalized or read-only transaction are no-ops, every other operation on
//! a finalized write transaction is a usage error. Dropping an unfinished
//! write transaction releases the writer lock and discards the overlays:
//! abort is the default, never an accidental commit.
//!
//! ## Isolation
//!
//! Commit publishes the work directory with one pointer store; a reader
//! either sees the whole commit or none of it. Iterators hold their own
//! frozen roots: an iterator created inside a write transaction keeps
//! yielding the state it was created from even as the same transaction
//! keeps writing (the overlay's revision is bumped, demoting its nodes to
//! copy-on-write).

use core::fmt;
use std::sync::Arc;

use eyre::{bail, ensure, eyre, Result};
use parking_lot::MutexGuard;
use tracing::{debug, trace};

use crate::database::{Db, IndexTree};
use crate::directory::Directory;
use crate::id::{ID_INDEX_ID, ID_LENGTH};
use crate::index::Arg;
use crate::record::RecordRef;
use crate::schema::{IndexSchema, TableSchema};
use crate::trie::{Iter, TreeTxn};

/// Sentinel error for `delete` of a record whose primary key is absent.
///
/// Test with [`eyre::Report::is`]: `err.is::<NotFound>()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotFound;

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("not found")
    }
}

impl std::error::Error for NotFound {}

/// A read or write transaction.
pub struct Txn<'db> {
    db: &'db Db,
    write: bool,
    snapshot: Arc<Directory<IndexTree>>,
    /// The writer's next directory version; `None` once finalized.
    work: Option<Directory<IndexTree>>,
    guard: Option<MutexGuard<'db, ()>>,
}

impl<'db> Txn<'db> {
    pub(crate) fn new_read(db: &'db Db) -> Self {
        Txn {
            db,
            write: false,
            snapshot: db.current(),
            work: None,
            guard: None,
        }
    }

    pub(crate) fn new_write(db: &'db Db, guard: MutexGuard<'db, ()>) -> Self {
        let snapshot = db.current();
        let work = snapshot.next();
        Txn {
            db,
            write: true,
            snapshot,
            work: Some(work),
            guard: Some(guard),
        }
    }

    /// Whether this transaction may write.
    pub fn is_write(&self) -> bool {
        self.write
    }

    /// Adds or updates a record in `table`, returning the record it
    /// displaced under the same primary key.
    ///
    /// The displaced record's secondary keys are removed; the new
    /// record's are installed, except where a conditional index excludes
    /// it.
    pub fn insert(&mut self, table: u64, record: RecordRef) -> Result<Option<RecordRef>> {
        ensure!(self.write, "cannot insert in read-only transaction");
        let db = self.db;
        let schema = db
            .schema
            .table(table)
            .ok_or_else(|| eyre!("invalid table '{}'", table))?;
        check_entity(schema, &record, table)?;
        let work = self
            .work
            .as_mut()
            .ok_or_else(|| eyre!("transaction already finalized"))?;

        let id = record.id();
        let id_bytes = *id.as_bytes();

        let primary = schema
            .index(ID_INDEX_ID)
            .ok_or_else(|| eyre!("table '{}' has no primary index", table))?;
        let mut primary_tree = writable_index(work, primary.slot)?;
        let previous = primary_tree.insert(&id_bytes, record.clone());
        work.set(primary.slot, primary_tree.commit());

        for (&index_id, index_schema) in &schema.indexes {
            if index_id == ID_INDEX_ID {
                continue;
            }

            // The key the new record emits under this index, with the
            // primary key appended for non-unique indexes.
            let size = index_schema.indexer.size_from_record(record.as_ref())?;
            let mut new_key = None;
            let mut emitted = 0;
            if size > 0 {
                let total = physical_len(index_schema, size);
                let mut buf = vec![0u8; total];
                emitted = index_schema
                    .indexer
                    .write_from_record(&mut buf, record.as_ref())?;
                if !index_schema.unique {
                    buf[emitted..].copy_from_slice(&id_bytes);
                }
                new_key = Some(buf);
            }

            let mut tree = writable_index(work, index_schema.slot)?;

            // On update, clear the key the displaced record emitted,
            // unless the new insert overwrites the identical key.
            if let Some(prev) = &previous {
                let prev_size = index_schema.indexer.size_from_record(prev.as_ref())?;
                if prev_size > 0 {
                    let prev_total = physical_len(index_schema, prev_size);
                    let mut prev_buf = vec![0u8; prev_total];
                    let prev_emitted = index_schema
                        .indexer
                        .write_from_record(&mut prev_buf, prev.as_ref())?;
                    let same_key = matches!(&new_key, Some(key)
                        if key[..emitted] == prev_buf[..prev_emitted]);
                    if !same_key {
                        if !index_schema.unique {
                            prev_buf[prev_emitted..].copy_from_slice(&id_bytes);
                        }
                        tree.delete(&prev_buf);
                    }
                }
            }

            if let Some(key) = &new_key {
                tree.insert(key, record.clone());
            }
            work.set(index_schema.slot, tree.commit());
        }

        trace!(table, "inserted record");
        Ok(previous)
    }

    /// Removes the record stored under `record`'s primary key, returning
    /// it. Fails with [`NotFound`] when the key is absent, leaving every
    /// index untouched.
    pub fn delete(&mut self, table: u64, record: RecordRef) -> Result<Option<RecordRef>> {
        ensure!(self.write, "cannot delete in read-only transaction");
        let db = self.db;
        let schema = db
            .schema
            .table(table)
            .ok_or_else(|| eyre!("invalid table '{}'", table))?;
        check_entity(schema, &record, table)?;
        let work = self
            .work
            .as_mut()
            .ok_or_else(|| eyre!("transaction already finalized"))?;

        let id = record.id();
        let id_bytes = *id.as_bytes();

        let primary = schema
            .index(ID_INDEX_ID)
            .ok_or_else(|| eyre!("table '{}' has no primary index", table))?;
        let mut primary_tree = writable_index(work, primary.slot)?;
        let Some(previous) = primary_tree.delete(&id_bytes) else {
            return Err(eyre::Report::new(NotFound));
        };
        work.set(primary.slot, primary_tree.commit());

        // Secondary keys come from the record that was actually stored,
        // not from the argument.
        for (&index_id, index_schema) in &schema.indexes {
            if index_id == ID_INDEX_ID {
                continue;
            }
            let size = index_schema.indexer.size_from_record(previous.as_ref())?;
            if size == 0 {
                continue;
            }
            let total = physical_len(index_schema, size);
            let mut buf = vec![0u8; total];
            let emitted = index_schema
                .indexer
                .write_from_record(&mut buf, previous.as_ref())?;
            if !index_schema.unique {
                buf[emitted..].copy_from_slice(&id_bytes);
            }
            let mut tree = writable_index(work, index_schema.slot)?;
            tree.delete(&buf);
            work.set(index_schema.slot, tree.commit());
        }

        trace!(table, "deleted record");
        Ok(Some(previous))
    }

    /// Returns the first record matching the given index constraints, in
    /// ascending key order.
    pub fn first(&self, table: u64, index: u64, args: &[Arg<'_>]) -> Result<Option<RecordRef>> {
        let index_schema = self.lookup(table, index)?;
        let plan = query_key(index_schema, args)?;

        let tree = self.readable_index(index_schema.slot)?;
        if index_schema.unique && plan.complete {
            return Ok(tree.get(&plan.key).cloned());
        }

        let mut iter = tree.iter();
        plan.seek(&mut iter)?;
        Ok(iter.next().map(|(_, record)| record))
    }

    /// Returns an iterator over all records matching the given index
    /// constraints, in ascending key order.
    ///
    /// The iterator is a snapshot of the index at the moment it is
    /// created: later `insert`/`delete` calls in this same transaction do
    /// not change what it yields.
    pub fn iter(&mut self, table: u64, index: u64, args: &[Arg<'_>]) -> Result<ResultIter> {
        let index_schema = self.lookup(table, index)?;
        let slot = index_schema.slot;
        let plan = query_key(index_schema, args)?;

        let tree = self.readable_index_snapshot(slot)?;
        let mut iter = tree.iter();
        plan.seek(&mut iter)?;
        Ok(ResultIter { inner: iter })
    }

    /// Publishes this transaction's writes as the database's new committed
    /// state. No-op on read-only or already-finalized transactions.
    pub fn commit(&mut self) {
        if !self.write {
            return;
        }
        let Some(work) = self.work.take() else {
            return;
        };
        self.db.publish(Arc::new(work));
        debug!("transaction committed");
        self.guard = None;
    }

    /// Discards this transaction's writes. No-op on read-only or
    /// already-finalized transactions.
    pub fn abort(&mut self) {
        if !self.write {
            return;
        }
        if self.work.take().is_none() {
            return;
        }
        debug!("transaction aborted");
        self.guard = None;
    }

    fn lookup(&self, table: u64, index: u64) -> Result<&IndexSchema> {
        let table_schema = self
            .db
            .schema
            .table(table)
            .ok_or_else(|| eyre!("invalid table '{}'", table))?;
        table_schema
            .index(index)
            .ok_or_else(|| eyre!("invalid index '{}'", index))
    }

    /// The committed or overlay tree for a slot, without detaching it.
    fn readable_index(&self, slot: u64) -> Result<&IndexTree> {
        let dir: &Directory<IndexTree> = if self.write {
            self.work
                .as_ref()
                .ok_or_else(|| eyre!("transaction already finalized"))?
        } else {
            &self.snapshot
        };
        dir.get(slot)
            .map(|(tree, _)| tree)
            .ok_or_else(|| eyre!("index slot {} missing from directory", slot))
    }

    /// A frozen view of a slot for iterators. On a dirty slot the overlay
    /// revision is bumped so later writes copy instead of mutating what
    /// the iterator walks.
    fn readable_index_snapshot(&mut self, slot: u64) -> Result<IndexTree> {
        if !self.write {
            return self
                .snapshot
                .get(slot)
                .map(|(tree, _)| tree.clone())
                .ok_or_else(|| eyre!("index slot {} missing from directory", slot));
        }
        let work = self
            .work
            .as_mut()
            .ok_or_else(|| eyre!("transaction already finalized"))?;
        let (tree, dirty) = work
            .get(slot)
            .map(|(tree, dirty)| (tree.clone(), dirty))
            .ok_or_else(|| eyre!("index slot {} missing from directory", slot))?;
        if !dirty {
            return Ok(tree);
        }
        let mut overlay = tree.resume();
        let frozen = overlay.snapshot();
        work.set(slot, overlay.commit());
        Ok(frozen)
    }
}

/// Routes a slot to its overlay: dirty slots resume the overlay already
/// in progress, clean slots open a fresh one over the committed tree.
fn writable_index(
    work: &Directory<IndexTree>,
    slot: u64,
) -> Result<TreeTxn<RecordRef>> {
    let (tree, dirty) = work
        .get(slot)
        .ok_or_else(|| eyre!("index slot {} missing from directory", slot))?;
    Ok(if dirty { tree.resume() } else { tree.txn() })
}

/// Physical key length: emitted bytes, plus the primary key for
/// non-unique indexes.
fn physical_len(schema: &IndexSchema, emitted: usize) -> usize {
    if schema.unique {
        emitted
    } else {
        emitted + ID_LENGTH
    }
}

fn check_entity(schema: &TableSchema, record: &RecordRef, table: u64) -> Result<()> {
    if let Some(entity) = schema.entity {
        ensure!(
            record.type_id_of() == entity,
            "wrong record type for table '{}'",
            table
        );
    }
    Ok(())
}

/// A compiled query argument list: the encoded key, the prefix /
/// lower-bound boundary, and the trailing rewind.
struct QueryPlan {
    key: Vec<u8>,
    split: usize,
    back: Option<u64>,
    /// All argument positions supplied, no operators: a unique index can
    /// answer with a direct get.
    complete: bool,
}

impl QueryPlan {
    fn seek(&self, iter: &mut Iter<RecordRef>) -> Result<()> {
        iter.seek_prefix(&self.key[..self.split]);
        if self.split < self.key.len() {
            iter.seek_lower_bound(&self.key);
        }
        if let Some(steps) = self.back {
            iter.back(steps)?;
        }
        Ok(())
    }
}

fn query_key(schema: &IndexSchema, args: &[Arg<'_>]) -> Result<QueryPlan> {
    let defs = schema.indexer.args();

    let mut back = None;
    let mut from_seen = false;
    let mut num = 0usize;
    let mut size = 0usize;
    for (pos, arg) in args.iter().enumerate() {
        match arg {
            Arg::Back(steps) => {
                ensure!(back.is_none(), "operator 'back' may appear only once");
                ensure!(
                    pos == args.len() - 1,
                    "operator 'back' must be the last argument"
                );
                back = Some(*steps);
            }
            Arg::From => {
                ensure!(!from_seen, "operator 'from' may appear only once");
                from_seen = true;
            }
            value => {
                ensure!(
                    num < defs.len(),
                    "too many arguments, received: {}, acceptable: {}",
                    args.len(),
                    defs.len()
                );
                size += defs[num].size_from_arg(value)?;
                num += 1;
            }
        }
    }

    if num == 0 {
        return Ok(QueryPlan {
            key: Vec::new(),
            split: 0,
            back,
            complete: false,
        });
    }
    if size == 0 {
        bail!("empty key");
    }

    let mut key = vec![0u8; size];
    let mut split = size;
    let mut written = 0usize;
    let mut position = 0usize;
    for arg in args {
        match arg {
            Arg::Back(_) => {}
            Arg::From => split = written,
            value => {
                written += defs[position].write_from_arg(&mut key[written..], value)?;
                position += 1;
            }
        }
    }

    let complete = num == defs.len() && !from_seen && back.is_none();
    Ok(QueryPlan {
        key,
        split,
        back,
        complete,
    })
}

/// Iterator over the records matching a query, detached from the
/// transaction that produced it.
pub struct ResultIter {
    inner: Iter<RecordRef>,
}

impl ResultIter {
    /// Moves the cursor `steps` positions earlier in key order, within
    /// the query's prefix domain. Fails when fewer positions exist.
    pub fn back(&mut self, steps: u64) -> Result<()> {
        self.inner.back(steps)
    }
}

impl std::fmt::Debug for ResultIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultIter").finish()
    }
}

impl Iterator for ResultIter {
    type Item = RecordRef;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, record)| record)
    }
}

// Keeps the borrow checker honest about the writer guard: dropping an
// active write transaction releases the lock and discards the overlays.
impl Drop for Txn<'_> {
    fn drop(&mut self) {
        if self.write && self.work.is_some() {
            trace!("write transaction dropped without commit");
        }
    }
}
