//! Bob Jenkins' lookup3 hash as used by CASC
//!
//! `hashlittle` guards the header and entry blocks of the guarded index
//! layout. `hashlittle2` over a normalised path produces the 64-bit name
//! hash that root manifests store in place of file names.

use std::fmt;

/// Jenkins96 hash result containing both 64-bit and 32-bit components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Jenkins96 {
    /// Combined `(pc << 32) | pb` value, the form root manifests store
    pub hash64: u64,
    /// Primary 32-bit value (`pc`)
    pub hash32: u32,
}

impl Jenkins96 {
    /// Hash raw bytes with zero seeds
    pub fn hash(data: &[u8]) -> Self {
        let mut pc = 0u32;
        let mut pb = 0u32;
        hashlittle2(data, &mut pc, &mut pb);

        Self {
            hash64: (u64::from(pc) << 32) | u64::from(pb),
            hash32: pc,
        }
    }

    /// Hash a file path the way root manifests do
    ///
    /// The path is uppercased and forward slashes become backslashes
    /// before hashing.
    pub fn hash_path(path: &str) -> Self {
        let normalized: Vec<u8> = path
            .bytes()
            .map(|b| if b == b'/' { b'\\' } else { b.to_ascii_uppercase() })
            .collect();
        Self::hash(&normalized)
    }

    /// Create from raw components
    pub fn from_parts(hash64: u64, hash32: u32) -> Self {
        Self { hash64, hash32 }
    }
}

impl fmt::Display for Jenkins96 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}:{:08x}", self.hash64, self.hash32)
    }
}

/// Compute the single 32-bit lookup3 hash
///
/// # Examples
///
/// ```
/// use casc_reader_crypto::jenkins::hashlittle;
///
/// assert_eq!(hashlittle(b"", 0), 0xdead_beef);
/// assert_eq!(hashlittle(b"Four score and seven years ago", 0), 0x1777_0551);
/// ```
pub fn hashlittle(data: &[u8], initval: u32) -> u32 {
    let mut pc = initval;
    let mut pb = 0u32;
    hashlittle2(data, &mut pc, &mut pb);
    pc
}

/// Compute both 32-bit lookup3 outputs
///
/// `pc` and `pb` are seeds on input and hold the two hash values on output.
///
/// ```
/// use casc_reader_crypto::jenkins::hashlittle2;
///
/// let mut pc = 0u32;
/// let mut pb = 0u32;
/// hashlittle2(b"Four score and seven years ago", &mut pc, &mut pb);
/// assert_eq!((pc, pb), (0x1777_0551, 0xce72_26e6));
/// ```
pub fn hashlittle2(key: &[u8], pc: &mut u32, pb: &mut u32) {
    let mut a = 0xdead_beef_u32
        .wrapping_add(u32::try_from(key.len()).unwrap_or(u32::MAX))
        .wrapping_add(*pc);
    let mut b = a;
    let mut c = a.wrapping_add(*pb);

    if key.is_empty() {
        *pc = c;
        *pb = b;
        return;
    }

    let mut k = key;
    while k.len() > 12 {
        a = a.wrapping_add(read_le(&k[0..4]));
        b = b.wrapping_add(read_le(&k[4..8]));
        c = c.wrapping_add(read_le(&k[8..12]));
        mix(&mut a, &mut b, &mut c);
        k = &k[12..];
    }

    // Last block holds 1..=12 bytes; missing bytes contribute nothing
    let mut tail = [0u8; 12];
    tail[..k.len()].copy_from_slice(k);
    a = a.wrapping_add(read_le(&tail[0..4]));
    b = b.wrapping_add(read_le(&tail[4..8]));
    c = c.wrapping_add(read_le(&tail[8..12]));

    final_mix(&mut a, &mut b, &mut c);

    *pc = c;
    *pb = b;
}

fn read_le(bytes: &[u8]) -> u32 {
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

fn final_mix(a: &mut u32, b: &mut u32, c: &mut u32) {
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
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hashlittle_known_answers() {
        assert_eq!(hashlittle(b"", 0), 0xdead_beef);
        assert_eq!(hashlittle(b"Four score and seven years ago", 0), 0x1777_0551);
        assert_eq!(hashlittle(b"Four score and seven years ago", 1), 0xcd62_8161);
    }

    #[test]
    fn test_hashlittle2_known_answers() {
        let mut pc = 0u32;
        let mut pb = 0u32;
        hashlittle2(b"", &mut pc, &mut pb);
        assert_eq!((pc, pb), (0xdead_beef, 0xdead_beef));

        let mut pc = 0u32;
        let mut pb = 0u32;
        hashlittle2(b"Four score and seven years ago", &mut pc, &mut pb);
        assert_eq!((pc, pb), (0x1777_0551, 0xce72_26e6));

        let mut pc = 1u32;
        let mut pb = 0u32;
        hashlittle2(b"Four score and seven years ago", &mut pc, &mut pb);
        assert_eq!((pc, pb), (0xcd62_8161, 0x6cbe_a4b3));
    }

    #[test]
    fn test_hashlittle_tail_lengths() {
        let cases: [(&[u8], u32); 14] = [
            (b"", 0xdead_beef),
            (b"a", 0x58d6_8708),
            (b"ab", 0xfbb3_a8df),
            (b"abc", 0x0e39_7631),
            (b"abcd", 0xb5f4_889c),
            (b"abcde", 0x026d_72de),
            (b"abcdef", 0xd6fa_502e),
            (b"abcdefg", 0xb11a_d4a5),
            (b"abcdefgh", 0x2995_c3be),
            (b"abcdefghi", 0xac65_72b4),
            (b"abcdefghij", 0x8bf7_d2ef),
            (b"abcdefghijk", 0x5f61_edf8),
            (b"abcdefghijkl", 0x4012_f87b),
            (b"abcdefghijklm", 0x9281_28f9),
        ];

        for (data, expected) in cases {
            let result = hashlittle(data, 0);
            assert_eq!(
                result,
                expected,
                "len={} got 0x{result:08x} expected 0x{expected:08x}",
                data.len()
            );
        }
    }

    #[test]
    fn test_hash_path_normalisation() {
        let a = Jenkins96::hash_path("world/maps/azeroth/azeroth.wdt");
        let b = Jenkins96::hash_path("WORLD\\MAPS\\AZEROTH\\AZEROTH.WDT");
        assert_eq!(a, b);
        assert_eq!(a, Jenkins96::hash(b"WORLD\\MAPS\\AZEROTH\\AZEROTH.WDT"));
        assert_ne!(a, Jenkins96::hash_path("world/maps/azeroth/azeroth.wdl"));
    }

    #[test]
    fn test_hash64_layout() {
        let mut pc = 0u32;
        let mut pb = 0u32;
        hashlittle2(b"Four score and seven years ago", &mut pc, &mut pb);
        let hash = Jenkins96::hash(b"Four score and seven years ago");
        assert_eq!(hash.hash64, 0x1777_0551_ce72_26e6);
        assert_eq!(hash.hash32, pc);
    }

    #[test]
    fn test_display() {
        let hash = Jenkins96::from_parts(0x1234_5678_9abc_def0, 0x1122_3344);
        assert_eq!(format!("{hash}"), "123456789abcdef0:11223344");
    }

    proptest! {
        #[test]
        fn hashlittle_matches_primary_output(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut pc = 0u32;
            let mut pb = 0u32;
            hashlittle2(&data, &mut pc, &mut pb);
            prop_assert_eq!(hashlittle(&data, 0), pc);
        }
    }
}
