//! # Index Key Builders
//!
//! An index is a recipe for deriving an ordered byte key from a record.
//! Builders compose by wrapping: a single projected field is the base
//! case, and concatenation, conditional gating, uniqueness marking, and
//! order reversal wrap other builders. "Active users by reverse creation
//! time" reads as
//!
//! ```text
//! reverse(multi([filtered(field(created_at), is_active), field(id)]))
//! ```
//!
//! ## The Two Sides of a Builder
//!
//! [`Indexer`] is the record side: given a live record, how many key bytes
//! will it emit (zero meaning "this record is excluded from the index"),
//! and emit them. [`ArgEncoder`] is the query side: one encoder per
//! argument position, flattened across the composition in declaration
//! order, each converting one [`Arg`] into the same bytes the record side
//! would emit for that component.
//!
//! A query may supply any prefix of the argument list: trailing
//! components are simply omitted, turning the lookup into a prefix scan
//! over the concatenated key.
//!
//! ## Handles
//!
//! Every builder returns an [`Index`] handle carrying a stable 64-bit
//! identifier (drawn from a process-wide counter at construction), the
//! entity type it reads, and the unique flag. Handles are what callers
//! pass to [`Db::open`](crate::Db::open) and what identifies the index in
//! queries.
//!
//! ## Construction Errors
//!
//! Builder misuse (no sub-indexes, mixing entity types in one
//! composition) panics at construction: these are programmer errors in
//! schema definitions, caught once at startup, never at query time.

pub mod field;
pub mod filtered;
pub mod multi;
pub mod reverse;
pub mod unique;

pub use field::field;
pub use filtered::filtered;
pub use multi::multi;
pub use reverse::reverse;
pub use unique::unique;

use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use eyre::Result;

use crate::id::Id;
use crate::record::Record;

/// One query argument, or one of the two positional operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg<'a> {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Str(&'a str),
    Id(Id),
    Time(DateTime<Utc>),
    /// Operator: arguments before form an exact prefix, arguments after
    /// form a lower bound inside that prefix.
    From,
    /// Operator (trailing only): rewind the produced iterator n positions.
    Back(u64),
}

impl Arg<'_> {
    /// Domain name for error messages.
    pub fn domain(&self) -> &'static str {
        match self {
            Arg::Bool(_) => "bool",
            Arg::U8(_) => "u8",
            Arg::U16(_) => "u16",
            Arg::U32(_) => "u32",
            Arg::U64(_) => "u64",
            Arg::I8(_) => "i8",
            Arg::I16(_) => "i16",
            Arg::I32(_) => "i32",
            Arg::I64(_) => "i64",
            Arg::Str(_) => "string",
            Arg::Id(_) => "id",
            Arg::Time(_) => "timestamp",
            Arg::From => "from operator",
            Arg::Back(_) => "back operator",
        }
    }

    /// Whether this is an operator marker rather than a key argument.
    pub fn is_operator(&self) -> bool {
        matches!(self, Arg::From | Arg::Back(_))
    }
}

macro_rules! arg_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Arg<'_> {
            fn from(value: $ty) -> Self {
                Arg::$variant(value)
            }
        }
    };
}

arg_from!(bool, Bool);
arg_from!(u8, U8);
arg_from!(u16, U16);
arg_from!(u32, U32);
arg_from!(u64, U64);
arg_from!(i8, I8);
arg_from!(i16, I16);
arg_from!(i32, I32);
arg_from!(i64, I64);
arg_from!(Id, Id);
arg_from!(DateTime<Utc>, Time);

impl<'a> From<&'a str> for Arg<'a> {
    fn from(value: &'a str) -> Self {
        Arg::Str(value)
    }
}

/// Encodes one query argument position into key bytes.
pub trait ArgEncoder: Send + Sync {
    /// Exact byte width the argument will occupy.
    fn size_from_arg(&self, arg: &Arg<'_>) -> Result<usize>;

    /// Encodes the argument into the front of `buf`, returning bytes
    /// written.
    fn write_from_arg(&self, buf: &mut [u8], arg: &Arg<'_>) -> Result<usize>;
}

/// Emits the full index key for a record.
pub trait Indexer: Send + Sync {
    /// Exact byte width the record's key will occupy; zero excludes the
    /// record from this index.
    fn size_from_record(&self, record: &dyn Record) -> Result<usize>;

    /// Encodes the record's key into the front of `buf`, returning bytes
    /// written.
    fn write_from_record(&self, buf: &mut [u8], record: &dyn Record) -> Result<usize>;

    /// Per-argument encoders, flattened in declaration order.
    fn args(&self) -> &[Arc<dyn ArgEncoder>];
}

/// Handle to a declared index: identity, entity type, key builder.
#[derive(Clone)]
pub struct Index {
    pub(crate) id: u64,
    pub(crate) entity: TypeId,
    pub(crate) unique: bool,
    pub(crate) indexer: Arc<dyn Indexer>,
}

impl Index {
    /// The stable identifier queries refer to this index by.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Entity type this index reads.
    pub fn entity(&self) -> TypeId {
        self.entity
    }

    /// Whether at most one record may exist per emitted key.
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Number of query arguments the index accepts.
    pub fn num_args(&self) -> usize {
        self.indexer.args().len()
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("id", &self.id)
            .field("unique", &self.unique)
            .field("num_args", &self.num_args())
            .finish()
    }
}

/// Index handle identifiers start at 1; 0 is the implicit primary index.
fn next_index_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Downcasts a record to the entity type an indexer was declared for.
pub(crate) fn record_as<T: Record>(record: &dyn Record) -> Result<&T> {
    record.downcast_ref::<T>().ok_or_else(|| {
        eyre::eyre!(
            "record is not a {} (wrong record type for this index)",
            std::any::type_name::<T>()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arg_domain_names() {
        assert_eq!(Arg::U64(1).domain(), "u64");
        assert_eq!(Arg::Str("x").domain(), "string");
        assert_eq!(Arg::From.domain(), "from operator");
        assert_eq!(Arg::Back(3).domain(), "back operator");
    }

    #[test]
    fn operators_are_recognized() {
        assert!(Arg::From.is_operator());
        assert!(Arg::Back(0).is_operator());
        assert!(!Arg::Bool(true).is_operator());
        assert!(!Arg::Id(Id::default()).is_operator());
    }

    #[test]
    fn arg_from_conversions() {
        assert_eq!(Arg::from(7u64), Arg::U64(7));
        assert_eq!(Arg::from(-3i32), Arg::I32(-3));
        assert_eq!(Arg::from("abc"), Arg::Str("abc"));
        assert_eq!(Arg::from(true), Arg::Bool(true));
    }

    #[test]
    fn index_ids_are_unique_and_nonzero() {
        let a = next_index_id();
        let b = next_index_id();
        assert_ne!(a, 0);
        assert_ne!(a, b);
    }
}
