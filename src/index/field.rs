//! # Single-Field Indexes
//!
//! The base builder: one encodable field projected out of the record by a
//! typed accessor closure captured at definition time. The closure replaces
//! the field-offset arithmetic a reflection-based engine would use: the
//! compiler checks that the field belongs to the entity and that its type
//! has an order-preserving encoding ([`FieldKey`]).
//!
//! ```no_run
//! use mossdb::{index, Id, Record};
//!
//! struct User {
//!     id: Id,
//!     age: u8,
//! }
//! # impl Record for User { fn id(&self) -> Id { self.id } }
//!
//! let by_age = index::field(|u: &User| &u.age);
//! ```

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

use eyre::Result;

use super::{next_index_id, record_as, Arg, ArgEncoder, Index, Indexer};
use crate::encoding::key::FieldKey;
use crate::record::Record;

/// Declares an index over one field of `T`.
pub fn field<T, F>(access: impl for<'a> Fn(&'a T) -> &'a F + Send + Sync + 'static) -> Index
where
    T: Record,
    F: FieldKey,
{
    Index {
        id: next_index_id(),
        entity: TypeId::of::<T>(),
        unique: false,
        indexer: Arc::new(FieldIndexer::<T, F> {
            access: Box::new(access),
            args: [Arc::new(FieldArg::<F>(PhantomData))],
        }),
    }
}

type Accessor<T, F> = Box<dyn for<'a> Fn(&'a T) -> &'a F + Send + Sync>;

struct FieldIndexer<T, F> {
    access: Accessor<T, F>,
    args: [Arc<dyn ArgEncoder>; 1],
}

impl<T: Record, F: FieldKey> Indexer for FieldIndexer<T, F> {
    fn size_from_record(&self, record: &dyn Record) -> Result<usize> {
        let entity = record_as::<T>(record)?;
        Ok((self.access)(entity).encoded_size())
    }

    fn write_from_record(&self, buf: &mut [u8], record: &dyn Record) -> Result<usize> {
        let entity = record_as::<T>(record)?;
        Ok((self.access)(entity).encode(buf))
    }

    fn args(&self) -> &[Arc<dyn ArgEncoder>] {
        &self.args
    }
}

struct FieldArg<F>(PhantomData<F>);

impl<F: FieldKey> ArgEncoder for FieldArg<F> {
    fn size_from_arg(&self, arg: &Arg<'_>) -> Result<usize> {
        F::arg_size(arg)
    }

    fn write_from_arg(&self, buf: &mut [u8], arg: &Arg<'_>) -> Result<usize> {
        F::encode_arg(arg, buf)
    }
}
