//! # Schema
//!
//! The declared shape of a database: tables addressed by position, each
//! holding its set of index schemas keyed by index identifier. Schemas are
//! built once from the caller's index declarations at
//! [`Db::open`](crate::Db::open), validated, and never change afterwards;
//! adding or removing an index means opening a new database.
//!
//! Every table gets the implicit primary index at
//! [`ID_INDEX_ID`](crate::id::ID_INDEX_ID), unique, keyed on the record's
//! 16-byte identifier. Each index (primary included) is assigned a
//! directory slot: the small integer its trie lives under in the index
//! directory.
//!
//! A table's entity type is pinned by its declared indexes; inserts of a
//! different record type are rejected at run time. A table declared with
//! no secondary indexes has no pinned type and accepts any record.

use std::any::TypeId;
use std::sync::Arc;

use eyre::{bail, ensure, Result};
use hashbrown::HashMap;

use crate::id::{IdIndexer, ID_INDEX_ID};
use crate::index::{Index, Indexer};

/// Schema of one index: uniqueness, key builder, directory slot.
pub struct IndexSchema {
    pub(crate) unique: bool,
    pub(crate) indexer: Arc<dyn Indexer>,
    pub(crate) slot: u64,
}

impl IndexSchema {
    /// Whether at most one record may exist per emitted key.
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Directory slot this index's trie lives under.
    pub fn slot(&self) -> u64 {
        self.slot
    }
}

impl std::fmt::Debug for IndexSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSchema")
            .field("unique", &self.unique)
            .field("slot", &self.slot)
            .finish()
    }
}

/// Schema of one table: its indexes and pinned entity type.
pub struct TableSchema {
    pub(crate) entity: Option<TypeId>,
    pub(crate) indexes: HashMap<u64, IndexSchema>,
}

impl std::fmt::Debug for TableSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSchema")
            .field("entity", &self.entity)
            .field("indexes", &self.indexes)
            .finish()
    }
}

impl TableSchema {
    /// The index schema for `index_id`, if declared on this table.
    pub fn index(&self, index_id: u64) -> Option<&IndexSchema> {
        self.indexes.get(&index_id)
    }

    /// Identifiers of all indexes on this table, primary included.
    pub fn index_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.indexes.keys().copied()
    }
}

/// The validated schema of a whole database.
pub struct DbSchema {
    pub(crate) tables: Vec<TableSchema>,
}

impl std::fmt::Debug for DbSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbSchema")
            .field("tables", &self.tables)
            .finish()
    }
}

impl DbSchema {
    /// Builds and validates a schema from per-table index declarations.
    ///
    /// The outer list is indexed by table id; the inner lists are the
    /// declared secondary indexes. The primary index is added here, and
    /// directory slots are assigned sequentially across all indexes.
    pub fn build(tables: Vec<Vec<Index>>) -> Result<Self> {
        ensure!(!tables.is_empty(), "schema has no tables defined");

        let mut slot = 0u64;
        let mut built = Vec::with_capacity(tables.len());
        for (table_id, declared) in tables.into_iter().enumerate() {
            let mut indexes = HashMap::with_capacity(declared.len() + 1);
            slot += 1;
            indexes.insert(
                ID_INDEX_ID,
                IndexSchema {
                    unique: true,
                    indexer: Arc::new(IdIndexer),
                    slot,
                },
            );

            let mut entity = None;
            for index in declared {
                match entity {
                    None => entity = Some(index.entity),
                    Some(pinned) => ensure!(
                        pinned == index.entity,
                        "table {} mixes entity types across indexes",
                        table_id
                    ),
                }
                ensure!(
                    !index.indexer.args().is_empty(),
                    "table {} index {} has no argument encoders",
                    table_id,
                    index.id()
                );
                if index.id() == ID_INDEX_ID {
                    bail!("table {} redeclares the primary index", table_id);
                }
                slot += 1;
                let replaced = indexes.insert(
                    index.id,
                    IndexSchema {
                        unique: index.unique,
                        indexer: index.indexer,
                        slot,
                    },
                );
                ensure!(
                    replaced.is_none(),
                    "table {} declares index {} twice",
                    table_id,
                    index.id
                );
            }

            built.push(TableSchema { entity, indexes });
        }

        Ok(DbSchema { tables: built })
    }

    /// The schema for `table`, if it exists.
    pub fn table(&self, table: u64) -> Option<&TableSchema> {
        self.tables.get(table as usize)
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the schema holds no tables. Never true after validation.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Directory slots of every index across all tables.
    pub(crate) fn slots(&self) -> impl Iterator<Item = u64> + '_ {
        self.tables
            .iter()
            .flat_map(|table| table.indexes.values().map(|schema| schema.slot))
    }
}
