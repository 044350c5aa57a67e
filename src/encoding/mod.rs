//! # Encoding Module
//!
//! Order-preserving key encoding for mossdb: primitive values become
//! bytestrings whose lexicographic order matches the natural order of the
//! domain, so a single byte-ordered radix trie serves as the ordered index
//! for every supported field type.

pub mod key;
