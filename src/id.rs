//! # Record Identifiers
//!
//! Every record stored in mossdb is addressed by a fixed 16-byte identifier,
//! the primary key of its table. The identifier is opaque to the engine: it
//! packs verbatim into index keys and compares bytewise, so any scheme the
//! caller likes (random, derived, externally assigned) sorts the primary
//! index in the obvious way.
//!
//! `Id::random()` draws a version-4 UUID, which is the usual way to mint
//! collision-free identifiers without coordination. The primary index of
//! every table lives at the well-known index id [`ID_INDEX_ID`] and is
//! always unique.

use core::fmt;

use crate::encoding::key;
use crate::index::{Arg, ArgEncoder, Indexer};
use crate::record::Record;
use eyre::{bail, Result};
use std::sync::Arc;

/// Byte width of a record identifier.
pub const ID_LENGTH: usize = 16;

/// Index id of the implicit primary index present on every table.
pub const ID_INDEX_ID: u64 = 0;

/// Fixed-width primary key of a record.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Id(pub [u8; ID_LENGTH]);

impl Id {
    /// Mints a fresh random identifier (UUID v4 bytes).
    pub fn random() -> Self {
        Id(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Returns the identifier bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; ID_LENGTH] {
        &self.0
    }
}

impl From<[u8; ID_LENGTH]> for Id {
    fn from(bytes: [u8; ID_LENGTH]) -> Self {
        Id(bytes)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id(")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

/// Key builder of the implicit primary index: the identifier packs verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdIndexer;

impl Indexer for IdIndexer {
    fn size_from_record(&self, _record: &dyn Record) -> Result<usize> {
        Ok(ID_LENGTH)
    }

    fn write_from_record(&self, buf: &mut [u8], record: &dyn Record) -> Result<usize> {
        Ok(key::encode_id(&record.id(), buf))
    }

    fn args(&self) -> &[Arc<dyn ArgEncoder>] {
        static ARGS: std::sync::OnceLock<[Arc<dyn ArgEncoder>; 1]> = std::sync::OnceLock::new();
        ARGS.get_or_init(|| [Arc::new(IdArg)])
    }
}

/// Query-argument encoder accepting [`Arg::Id`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IdArg;

impl ArgEncoder for IdArg {
    fn size_from_arg(&self, arg: &Arg<'_>) -> Result<usize> {
        match arg {
            Arg::Id(_) => Ok(ID_LENGTH),
            other => bail!("expected id argument, got {}", other.domain()),
        }
    }

    fn write_from_arg(&self, buf: &mut [u8], arg: &Arg<'_>) -> Result<usize> {
        match arg {
            Arg::Id(id) => Ok(key::encode_id(id, buf)),
            other => bail!("expected id argument, got {}", other.domain()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordRef;

    #[derive(Debug)]
    struct Row {
        id: Id,
    }

    impl Record for Row {
        fn id(&self) -> Id {
            self.id
        }
    }

    #[test]
    fn id_length_is_sixteen() {
        assert_eq!(ID_LENGTH, 16);
        assert_eq!(Id::default().as_bytes().len(), 16);
    }

    #[test]
    fn random_ids_differ() {
        assert_ne!(Id::random(), Id::random());
    }

    #[test]
    fn id_orders_bytewise() {
        let low = Id([0; 16]);
        let mut high_bytes = [0u8; 16];
        high_bytes[0] = 1;
        let high = Id(high_bytes);
        assert!(low < high);
    }

    #[test]
    fn debug_renders_hex() {
        let mut bytes = [0u8; 16];
        bytes[15] = 0xAB;
        let rendered = format!("{:?}", Id(bytes));
        assert_eq!(rendered, "Id(000000000000000000000000000000ab)");
    }

    #[test]
    fn indexer_packs_record_id_verbatim() {
        let mut bytes = [0u8; 16];
        bytes[0] = 7;
        bytes[15] = 9;
        let record: RecordRef = Arc::new(Row { id: Id(bytes) });

        let indexer = IdIndexer;
        assert_eq!(indexer.size_from_record(record.as_ref()).unwrap(), 16);

        let mut buf = [0u8; 16];
        let written = indexer.write_from_record(&mut buf, record.as_ref()).unwrap();
        assert_eq!(written, 16);
        assert_eq!(buf, bytes);
    }

    #[test]
    fn arg_encoder_accepts_only_ids() {
        let encoder = IdArg;
        let id = Id([3; 16]);
        assert_eq!(encoder.size_from_arg(&Arg::Id(id)).unwrap(), 16);

        let mut buf = [0u8; 16];
        assert_eq!(encoder.write_from_arg(&mut buf, &Arg::Id(id)).unwrap(), 16);
        assert_eq!(buf, [3; 16]);

        assert!(encoder.size_from_arg(&Arg::U64(1)).is_err());
    }
}
