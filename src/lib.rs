//! # mossdb - Embedded In-Memory MVCC Database
//!
//! mossdb stores caller-owned records in a fixed set of tables, each
//! record reachable through a mandatory 16-byte primary key and any number
//! of declared secondary indexes. Readers and a single concurrent writer
//! see internally consistent snapshots; committed writes publish
//! atomically; aborted writes leave no trace; a point-in-time snapshot of
//! the whole database costs one pointer copy.
//!
//! There is no durability: this is the transactional, indexed working set
//! of a process, not its system of record.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use mossdb::{index, Arg, Db, Id, Record};
//!
//! struct User {
//!     id: Id,
//!     name: String,
//!     age: u8,
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
//!
//! let db = Db::open(vec![vec![by_name]])?;
//!
//! let mut txn = db.txn(true);
//! txn.insert(0, Arc::new(User { id: Id::random(), name: "ada".into(), age: 36 }))?;
//! txn.commit();
//!
//! let reader = db.txn(false);
//! let user = reader.first(0, name_index, &[Arg::Str("ada")])?.unwrap();
//! assert_eq!(user.downcast_ref::<User>().unwrap().age, 36);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Public API (Db / Txn)            │
//! ├─────────────────────────────────────────┤
//! │  Schema & Index Directory │ Transactions│
//! ├───────────────────────────┴─────────────┤
//! │   Index Key Builders (field/multi/...)  │
//! ├─────────────────────────────────────────┤
//! │   Order-Preserving Key Encoding         │
//! ├─────────────────────────────────────────┤
//! │   Immutable Radix Tries (per index)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Every index owns an immutable radix trie mapping order-preserving byte
//! keys to shared record references. A write transaction lays
//! copy-on-write overlays over the tries it touches and publishes them
//! all at once by swapping the directory pointer; readers keep walking
//! whichever revision they started on.
//!
//! ## Module Overview
//!
//! - [`database`]: the [`Db`] façade (open, transactions, snapshots)
//! - [`txn`]: transaction engine, queries, [`ResultIter`]
//! - [`index`]: composable key builders and the [`Arg`] query surface
//! - [`encoding`]: order-preserving primitive encoders
//! - [`trie`]: the immutable radix trie
//! - [`directory`]: versioned map from index slot to trie root
//! - [`record`]: the [`Record`] bridge trait
//! - [`id`]: 16-byte record identifiers
//! - [`bits`]: byte-inversion and big-endian packing helpers
//!
//! ## Safety Contract
//!
//! Records are held by shared reference and never copied: callers must
//! not mutate a record's indexed fields after inserting it. Snapshots and
//! old iterators may hold the record long after it was deleted.

pub mod bits;
pub mod database;
pub mod directory;
pub mod encoding;
pub mod id;
pub mod index;
pub mod record;
pub mod schema;
pub mod trie;
pub mod txn;

pub use database::Db;
pub use id::{Id, ID_INDEX_ID, ID_LENGTH};
pub use index::{Arg, Index};
pub use record::{Record, RecordRef};
pub use schema::{DbSchema, IndexSchema, TableSchema};
pub use txn::{NotFound, ResultIter, Txn};
