// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Flat key encoding for the persistent backends.
//!
//! `zone || system-byte || id(u32 big-endian) || user-key`. Within one space
//! the flat order equals the user-key order, which is all the merge scan
//! relies on; queries never span spaces.

use byteorder::{BigEndian, ByteOrder};

use basalt_shared::space::ObjectSpace;

pub fn encode_space_prefix(space: &ObjectSpace) -> Vec<u8> {
    let mut out = Vec::with_capacity(space.zone.len() + 5);
    out.extend_from_slice(&space.zone);
    out.push(space.system as u8);
    let mut id = [0u8; 4];
    BigEndian::write_u32(&mut id, space.id);
    out.extend_from_slice(&id);
    out
}

pub fn encode_key(space: &ObjectSpace, key: &[u8]) -> Vec<u8> {
    let mut out = encode_space_prefix(space);
    out.extend_from_slice(key);
    out
}

/// Strip a known space prefix off a flat key. Returns `None` when the flat
/// key belongs to a different space.
pub fn decode_user_key<'a>(space: &ObjectSpace, flat: &'a [u8]) -> Option<&'a [u8]> {
    let prefix = encode_space_prefix(space);
    flat.strip_prefix(prefix.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_order_matches_user_key_order_within_space() {
        let space = ObjectSpace::new(b"zone".to_vec(), 3, false);
        let a = encode_key(&space, b"aaa");
        let b = encode_key(&space, b"aab");
        assert!(a < b);
    }

    #[test]
    fn decode_rejects_other_spaces() {
        let space = ObjectSpace::kernel(1);
        let other = ObjectSpace::kernel(2);
        let flat = encode_key(&space, b"k");
        assert_eq!(decode_user_key(&space, &flat), Some(&b"k"[..]));
        assert_eq!(decode_user_key(&other, &flat), None);
    }
}
