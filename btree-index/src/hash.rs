//! Jenkins lookup3 hash.
//!
//! The container format hashes link names with lookup3 (`hashlittle`,
//! initial value 0) and stores the result in indexed-link-name records. It
//! uses the same function for its metadata checksums; this crate only reads
//! those checksums and never recomputes them.

/// Hash `bytes` with lookup3 `hashlittle`.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // length is mixed in modulo 2^32
pub fn lookup3(bytes: &[u8], initval: u32) -> u32 {
    let seed = 0xdead_beef_u32
        .wrapping_add(bytes.len() as u32)
        .wrapping_add(initval);
    let (mut a, mut b, mut c) = (seed, seed, seed);

    if bytes.is_empty() {
        return c;
    }

    // The final block (1..=12 bytes) is handled after the loop, so stop
    // while more than 12 bytes remain.
    let mut rest = bytes;
    while rest.len() > 12 {
        a = a.wrapping_add(word(&rest[0..4]));
        b = b.wrapping_add(word(&rest[4..8]));
        c = c.wrapping_add(word(&rest[8..12]));
        mix(&mut a, &mut b, &mut c);
        rest = &rest[12..];
    }

    let mut tail = [0u8; 12];
    tail[..rest.len()].copy_from_slice(rest);
    a = a.wrapping_add(word(&tail[0..4]));
    b = b.wrapping_add(word(&tail[4..8]));
    c = c.wrapping_add(word(&tail[8..12]));
    finalize(&mut a, &mut b, &mut c);
    c
}

/// Hash of a link name as stored in indexed-link-name records.
#[must_use]
pub fn link_name_hash(name: &str) -> u32 {
    lookup3(name.as_bytes(), 0)
}

fn word(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(4);
    *c = c.wrapping_add(*b);
    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(6);
    *a = a.wrapping_add(*c);
    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(8);
    *b = b.wrapping_add(*a);
    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(16);
    *c = c.wrapping_add(*b);
    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(19);
    *a = a.wrapping_add(*c);
    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(4);
    *b = b.wrapping_add(*a);
}

fn finalize(a: &mut u32, b: &mut u32, c: &mut u32) {
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(14));
    *a ^= *c;
    *a = a.wrapping_sub(c.rotate_left(11));
    *b ^= *a;
    *b = b.wrapping_sub(a.rotate_left(25));
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(16));
    *a ^= *c;
    *a = a.wrapping_sub(c.rotate_left(4));
    *b ^= *a;
    *b = b.wrapping_sub(a.rotate_left(14));
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(24));
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference values from the lookup3.c self-test driver.
    #[test]
    fn test_empty_input() {
        assert_eq!(lookup3(b"", 0), 0xdead_beef);
        assert_eq!(lookup3(b"", 0xdead_beef), 0xbd5b_7dde);
    }

    #[test]
    fn test_reference_sentence() {
        let text = b"Four score and seven years ago";
        assert_eq!(lookup3(text, 0), 0x1777_0551);
        assert_eq!(lookup3(text, 1), 0xcd62_8161);
    }

    #[test]
    fn test_link_name_hash_uses_zero_seed() {
        assert_eq!(link_name_hash("dataset"), lookup3(b"dataset", 0));
        assert_ne!(link_name_hash("dataset"), link_name_hash("datasets"));
    }

    #[test]
    fn test_block_boundaries_differ() {
        // 12 bytes stays in the final block, 13 takes one trip through mix.
        let twelve = lookup3(b"abcdefghijkl", 0);
        let thirteen = lookup3(b"abcdefghijklm", 0);
        assert_ne!(twelve, thirteen);
    }
}
