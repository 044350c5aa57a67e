//! # Byte-Comparable Key Encoding
//!
//! This module provides the per-domain value encoders behind every index
//! key in mossdb. All encoded keys compare with a single `memcmp`, enabling
//! the radix trie to order records without any type-specific logic at
//! comparison time.
//!
//! ## Encodings
//!
//! | Domain            | Width  | Encoding                                        |
//! |-------------------|--------|-------------------------------------------------|
//! | bool              | 1      | 0x00 / 0x01                                     |
//! | u8/u16/u32/u64    | 1..8   | big-endian                                      |
//! | i8/i16/i32/i64    | 1..8   | big-endian, sign bit flipped                    |
//! | string            | len+1  | raw bytes, then a 0x00 terminator               |
//! | identifier        | 16     | verbatim                                        |
//! | timestamp         | 12     | sign-flipped unix seconds (i64 BE) ++ nanos (u32 BE) |
//!
//! ## Why These Shapes
//!
//! - Unsigned integers in big-endian compare bytewise exactly as they
//!   compare numerically.
//! - Signed integers flip the top bit so that the negative half of the
//!   range sorts below the positive half (two's complement would put
//!   -1 above i64::MAX bytewise).
//! - Strings carry a trailing 0x00 so a key is never a prefix of a longer
//!   key from the same index component: "ab" must sort strictly before
//!   "ab\x01c" yet never compare equal to a composite key that merely
//!   starts with "ab".
//! - Timestamps pack seconds before nanoseconds, both in the orderings
//!   above, so chronological order is bytewise order. The second count is
//!   chrono's native unix count.
//!
//! ## Field Binding
//!
//! [`FieldKey`] ties a Rust field type to its encoder and to the query
//! argument variant that carries values of that domain. Index builders are
//! generic over `FieldKey`, which makes "indexing a field of an
//! unsupported type" a compile error rather than a runtime one.
//!
//! All encode functions write into the front of a caller-provided buffer
//! and return the bytes written; sizes are exact, never estimates.

use chrono::{DateTime, Utc};
use eyre::{bail, Result};

use crate::bits;
use crate::id::{Id, ID_LENGTH};
use crate::index::Arg;

/// Width of an encoded bool.
pub const BOOL_WIDTH: usize = 1;
/// Width of an encoded timestamp: 8 seconds bytes + 4 nanosecond bytes.
pub const TIME_WIDTH: usize = 12;

/// Encodes a bool as a single 0x00 / 0x01 byte.
#[inline]
pub fn encode_bool(value: bool, buf: &mut [u8]) -> usize {
    buf[0] = value as u8;
    BOOL_WIDTH
}

#[inline]
pub fn encode_u8(value: u8, buf: &mut [u8]) -> usize {
    buf[0] = value;
    1
}

#[inline]
pub fn encode_u16(value: u16, buf: &mut [u8]) -> usize {
    bits::put_u16(value, buf)
}

#[inline]
pub fn encode_u32(value: u32, buf: &mut [u8]) -> usize {
    bits::put_u32(value, buf)
}

#[inline]
pub fn encode_u64(value: u64, buf: &mut [u8]) -> usize {
    bits::put_u64(value, buf)
}

#[inline]
pub fn encode_i8(value: i8, buf: &mut [u8]) -> usize {
    buf[0] = (value as u8) ^ 0x80;
    1
}

#[inline]
pub fn encode_i16(value: i16, buf: &mut [u8]) -> usize {
    bits::put_u16((value as u16) ^ 0x8000, buf)
}

#[inline]
pub fn encode_i32(value: i32, buf: &mut [u8]) -> usize {
    bits::put_u32((value as u32) ^ 0x8000_0000, buf)
}

#[inline]
pub fn encode_i64(value: i64, buf: &mut [u8]) -> usize {
    bits::put_u64((value as u64) ^ 0x8000_0000_0000_0000, buf)
}

/// Encodes a string as its raw bytes followed by a 0x00 terminator.
#[inline]
pub fn encode_str(value: &str, buf: &mut [u8]) -> usize {
    let len = value.len();
    buf[..len].copy_from_slice(value.as_bytes());
    buf[len] = 0x00;
    len + 1
}

/// Encoded width of a string: its byte length plus the terminator.
#[inline]
pub fn str_width(value: &str) -> usize {
    value.len() + 1
}

/// Packs an identifier verbatim.
#[inline]
pub fn encode_id(id: &Id, buf: &mut [u8]) -> usize {
    buf[..ID_LENGTH].copy_from_slice(id.as_bytes());
    ID_LENGTH
}

/// Encodes a timestamp as sign-flipped big-endian unix seconds followed by
/// big-endian subsecond nanoseconds.
#[inline]
pub fn encode_time(time: &DateTime<Utc>, buf: &mut [u8]) -> usize {
    bits::put_u64((time.timestamp() as u64) ^ 0x8000_0000_0000_0000, buf);
    bits::put_u32(time.timestamp_subsec_nanos(), &mut buf[8..]);
    TIME_WIDTH
}

/// Binds a field type to its byte encoding and its query-argument domain.
///
/// The value side (`encoded_size` / `encode`) reads from a live record
/// field. The argument side (`arg_size` / `encode_arg`) reads from a query
/// [`Arg`] and fails with a usage error when the argument variant does not
/// carry this domain.
pub trait FieldKey: Send + Sync + 'static {
    /// Domain name used in error messages.
    const DOMAIN: &'static str;

    /// Exact byte width this value encodes to.
    fn encoded_size(&self) -> usize;

    /// Encodes this value into the front of `buf`, returning bytes written.
    fn encode(&self, buf: &mut [u8]) -> usize;

    /// Exact byte width the argument encodes to.
    fn arg_size(arg: &Arg<'_>) -> Result<usize>;

    /// Encodes the argument into the front of `buf`, returning bytes written.
    fn encode_arg(arg: &Arg<'_>, buf: &mut [u8]) -> Result<usize>;
}

macro_rules! fixed_width_field_key {
    ($ty:ty, $domain:literal, $variant:ident, $width:expr, $encode:path) => {
        impl FieldKey for $ty {
            const DOMAIN: &'static str = $domain;

            fn encoded_size(&self) -> usize {
                $width
            }

            fn encode(&self, buf: &mut [u8]) -> usize {
                $encode(*self, buf)
            }

            fn arg_size(arg: &Arg<'_>) -> Result<usize> {
                match arg {
                    Arg::$variant(_) => Ok($width),
                    other => bail!("expected {} argument, got {}", $domain, other.domain()),
                }
            }

            fn encode_arg(arg: &Arg<'_>, buf: &mut [u8]) -> Result<usize> {
                match arg {
                    Arg::$variant(v) => Ok($encode(*v, buf)),
                    other => bail!("expected {} argument, got {}", $domain, other.domain()),
                }
            }
        }
    };
}

fixed_width_field_key!(bool, "bool", Bool, BOOL_WIDTH, encode_bool);
fixed_width_field_key!(u8, "u8", U8, 1, encode_u8);
fixed_width_field_key!(u16, "u16", U16, 2, encode_u16);
fixed_width_field_key!(u32, "u32", U32, 4, encode_u32);
fixed_width_field_key!(u64, "u64", U64, 8, encode_u64);
fixed_width_field_key!(i8, "i8", I8, 1, encode_i8);
fixed_width_field_key!(i16, "i16", I16, 2, encode_i16);
fixed_width_field_key!(i32, "i32", I32, 4, encode_i32);
fixed_width_field_key!(i64, "i64", I64, 8, encode_i64);

impl FieldKey for String {
    const DOMAIN: &'static str = "string";

    fn encoded_size(&self) -> usize {
        str_width(self)
    }

    fn encode(&self, buf: &mut [u8]) -> usize {
        encode_str(self, buf)
    }

    fn arg_size(arg: &Arg<'_>) -> Result<usize> {
        match arg {
            Arg::Str(s) => Ok(str_width(s)),
            other => bail!("expected string argument, got {}", other.domain()),
        }
    }

    fn encode_arg(arg: &Arg<'_>, buf: &mut [u8]) -> Result<usize> {
        match arg {
            Arg::Str(s) => Ok(encode_str(s, buf)),
            other => bail!("expected string argument, got {}", other.domain()),
        }
    }
}

impl FieldKey for Id {
    const DOMAIN: &'static str = "id";

    fn encoded_size(&self) -> usize {
        ID_LENGTH
    }

    fn encode(&self, buf: &mut [u8]) -> usize {
        encode_id(self, buf)
    }

    fn arg_size(arg: &Arg<'_>) -> Result<usize> {
        match arg {
            Arg::Id(_) => Ok(ID_LENGTH),
            other => bail!("expected id argument, got {}", other.domain()),
        }
    }

    fn encode_arg(arg: &Arg<'_>, buf: &mut [u8]) -> Result<usize> {
        match arg {
            Arg::Id(id) => Ok(encode_id(id, buf)),
            other => bail!("expected id argument, got {}", other.domain()),
        }
    }
}

impl FieldKey for DateTime<Utc> {
    const DOMAIN: &'static str = "timestamp";

    fn encoded_size(&self) -> usize {
        TIME_WIDTH
    }

    fn encode(&self, buf: &mut [u8]) -> usize {
        encode_time(self, buf)
    }

    fn arg_size(arg: &Arg<'_>) -> Result<usize> {
        match arg {
            Arg::Time(_) => Ok(TIME_WIDTH),
            other => bail!("expected timestamp argument, got {}", other.domain()),
        }
    }

    fn encode_arg(arg: &Arg<'_>, buf: &mut [u8]) -> Result<usize> {
        match arg {
            Arg::Time(t) => Ok(encode_time(t, buf)),
            other => bail!("expected timestamp argument, got {}", other.domain()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn bool_encodes_one_byte() {
        let mut buf = [0xAAu8; 1];
        assert_eq!(encode_bool(false, &mut buf), 1);
        assert_eq!(buf, [0x00]);
        assert_eq!(encode_bool(true, &mut buf), 1);
        assert_eq!(buf, [0x01]);
    }

    #[test]
    fn unsigned_encodes_big_endian() {
        let mut buf = [0u8; 8];
        encode_u16(0x0102, &mut buf);
        assert_eq!(buf[..2], [0x01, 0x02]);
        encode_u32(0x01020304, &mut buf);
        assert_eq!(buf[..4], [0x01, 0x02, 0x03, 0x04]);
        encode_u64(u64::MAX, &mut buf);
        assert_eq!(buf, [0xFF; 8]);
    }

    #[test]
    fn signed_flips_sign_bit() {
        let mut buf = [0u8; 8];
        encode_i8(i8::MIN, &mut buf);
        assert_eq!(buf[0], 0x00);
        encode_i8(-1, &mut buf);
        assert_eq!(buf[0], 0x7F);
        encode_i8(0, &mut buf);
        assert_eq!(buf[0], 0x80);
        encode_i8(i8::MAX, &mut buf);
        assert_eq!(buf[0], 0xFF);

        encode_i64(i64::MIN, &mut buf);
        assert_eq!(buf, [0x00; 8]);
        encode_i64(i64::MAX, &mut buf);
        assert_eq!(buf, [0xFF; 8]);
    }

    #[test]
    fn string_appends_terminator() {
        let mut buf = [0xAAu8; 8];
        let n = encode_str("abc", &mut buf);
        assert_eq!(n, 4);
        assert_eq!(buf[..4], [b'a', b'b', b'c', 0x00]);
        assert_eq!(str_width(""), 1);
    }

    #[test]
    fn string_prefix_sorts_before_extension() {
        let mut short = [0u8; 8];
        let mut long = [0u8; 8];
        let n1 = encode_str("ab", &mut short);
        let n2 = encode_str("abc", &mut long);
        assert!(short[..n1] < long[..n2]);
    }

    #[test]
    fn id_packs_verbatim() {
        let id = Id([9; 16]);
        let mut buf = [0u8; 16];
        assert_eq!(encode_id(&id, &mut buf), 16);
        assert_eq!(buf, [9; 16]);
    }

    #[test]
    fn time_packs_seconds_then_nanos() {
        let t = Utc.timestamp_opt(0, 5).unwrap();
        let mut buf = [0u8; TIME_WIDTH];
        assert_eq!(encode_time(&t, &mut buf), TIME_WIDTH);
        // Sign-flipped zero seconds.
        assert_eq!(buf[..8], [0x80, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(buf[8..], [0, 0, 0, 5]);
    }

    #[test]
    fn time_before_epoch_sorts_below_epoch() {
        let before = Utc.timestamp_opt(-1, 0).unwrap();
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let mut a = [0u8; TIME_WIDTH];
        let mut b = [0u8; TIME_WIDTH];
        encode_time(&before, &mut a);
        encode_time(&epoch, &mut b);
        assert!(a < b);
    }

    #[test]
    fn field_key_arg_rejects_wrong_domain() {
        assert!(u64::arg_size(&Arg::U64(1)).is_ok());
        assert!(u64::arg_size(&Arg::I64(1)).is_err());
        assert!(String::arg_size(&Arg::Bool(true)).is_err());
        assert!(<DateTime<Utc>>::arg_size(&Arg::U32(0)).is_err());
    }

    #[test]
    fn field_key_value_and_arg_agree() {
        let mut from_value = [0u8; 8];
        let mut from_arg = [0u8; 8];
        let v: i32 = -77;
        let n1 = v.encode(&mut from_value);
        let n2 = i32::encode_arg(&Arg::I32(-77), &mut from_arg).unwrap();
        assert_eq!(n1, n2);
        assert_eq!(from_value[..n1], from_arg[..n2]);
    }

    fn ordered<T, F: Fn(&T, &mut [u8]) -> usize>(encode: F, x: &T, y: &T) -> std::cmp::Ordering {
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        let n = encode(x, &mut a);
        let m = encode(y, &mut b);
        a[..n].cmp(&b[..m])
    }

    proptest! {
        #[test]
        fn prop_u64_order_preserved(x: u64, y: u64) {
            prop_assert_eq!(ordered(|v, b| encode_u64(*v, b), &x, &y), x.cmp(&y));
        }

        #[test]
        fn prop_i64_order_preserved(x: i64, y: i64) {
            prop_assert_eq!(ordered(|v, b| encode_i64(*v, b), &x, &y), x.cmp(&y));
        }

        #[test]
        fn prop_i16_order_preserved(x: i16, y: i16) {
            prop_assert_eq!(ordered(|v, b| encode_i16(*v, b), &x, &y), x.cmp(&y));
        }

        #[test]
        fn prop_string_order_preserved(x in "[a-z]{0,12}", y in "[a-z]{0,12}") {
            let mut a = vec![0u8; x.len() + 1];
            let mut b = vec![0u8; y.len() + 1];
            encode_str(&x, &mut a);
            encode_str(&y, &mut b);
            prop_assert_eq!(a.cmp(&b), x.as_bytes().cmp(y.as_bytes()));
        }

        #[test]
        fn prop_time_order_preserved(sx in -4_000_000_000i64..4_000_000_000, nx in 0u32..1_000_000_000,
                                     sy in -4_000_000_000i64..4_000_000_000, ny in 0u32..1_000_000_000) {
            let x = Utc.timestamp_opt(sx, nx).unwrap();
            let y = Utc.timestamp_opt(sy, ny).unwrap();
            let mut a = [0u8; TIME_WIDTH];
            let mut b = [0u8; TIME_WIDTH];
            encode_time(&x, &mut a);
            encode_time(&y, &mut b);
            prop_assert_eq!(a.cmp(&b), x.cmp(&y));
        }
    }
}
