//! # Immutable Radix Trie
//!
//! The ordered map at the heart of every index: byte-string keys to record
//! references, with structural sharing between versions. A committed
//! [`Tree`] is never modified; mutating it goes through a [`TreeTxn`]
//! overlay that copies exactly the nodes along the touched path and shares
//! everything else with the base revision.
//!
//! ## Shape
//!
//! Nodes carry a compressed prefix (path compression), an optional leaf
//! holding the full key and its value, and a vector of child edges sorted
//! by their first prefix byte. A leaf sorts before the node's children,
//! so a key always precedes its extensions in iteration order.
//!
//! ```text
//!             (root)
//!            /      \
//!        "app"      "ba"
//!        /   \      /  \
//!    leaf:"app" "le"  "r"  "t"
//!               leaf:"apple" ...
//! ```
//!
//! ## Versioning
//!
//! Every node is stamped with the revision of the overlay that
//! materialized it. An overlay mutating a node first compares stamps:
//! equal means the node was created by this overlay and is mutated in
//! place; different means the node is shared with an older revision and
//! gets cloned, restamped, and linked in place of the original. Readers
//! of previous roots can therefore never observe an in-progress mutation.
//!
//! Handing an overlay's current root to an iterator bumps the overlay's
//! revision, which demotes every existing node to "shared": the iterator
//! keeps a frozen view while the overlay continues to accept writes.
//!
//! ## Modules
//!
//! - [`node`]: node/leaf layout and edge arithmetic
//! - [`tree`]: [`Tree`], [`TreeTxn`], get/insert/delete
//! - [`iter`]: forward and reverse iterators, prefix and bound seeks,
//!   position rewind

pub mod iter;
pub mod node;
pub mod tree;

pub use iter::{Iter, RevIter};
pub use tree::{Tree, TreeTxn};
