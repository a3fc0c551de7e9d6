// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! UTF-16 keys and their ordering.
//!
//! Every page name is stored and compared as a sequence of UTF-16 code
//! units. Comparison is plain element-wise `u16` ordering, which `&[u16]`
//! already gives us through `Ord`: no collation tables, no case folding, no
//! surrogate-pair decoding. A name that needs more than 127 code units does
//! not fit the one-byte length fields in the index rows and is rejected at
//! intake.

/// Maximum key length in UTF-16 code units.
///
/// Both row header fields (shared prefix length and remaining length) are a
/// single byte with the high bit unused, so full keys are capped at 127.
pub const MAX_KEY_UNITS: usize = 127;

/// Encode a name as UTF-16 code units.
pub fn encode(name: &str) -> Vec<u16> {
    name.encode_utf16().collect()
}

/// Decode code units back to a `String`. Lone surrogates become U+FFFD,
/// which can only happen on a corrupted archive.
pub fn decode(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

/// Length of the longest common prefix of two keys, in code units.
///
/// Callers only pass keys that already satisfy [`MAX_KEY_UNITS`], so the
/// result always fits a `u8`.
pub fn common_prefix_len(lhs: &[u16], rhs: &[u16]) -> u8 {
    lhs.iter().zip(rhs.iter()).take_while(|(a, b)| a == b).count() as u8
}
