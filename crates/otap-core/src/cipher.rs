//! RC5 block cipher (16-bit words, 12 rounds, 128-bit key).
//!
//! The peripheral's bootloader decrypts every 4-byte group of a data chunk
//! with RC5-16/12 before committing it to flash, so the host encrypts with
//! the same parameters. Each group is an independent two-word block; no
//! chaining mode is applied on the wire.

use std::fmt;

/// Number of rounds (r).
const ROUNDS: usize = 12;
/// Key length in bytes (b).
const KEY_BYTES: usize = 16;
/// Key length in 16-bit words (c).
const KEY_WORDS: usize = 8;
/// Round-key table size, 2 * (r + 1) (t).
const TABLE_WORDS: usize = 26;

/// RC5 magic constants P and Q for 16-bit words.
const P16: u16 = 0xB7E1;
const Q16: u16 = 0x9E37;

/// Expanded round-key table derived from a 16-byte transfer key.
///
/// Derivation is the only step that touches key material. The schedule is
/// computed once per session, is immutable afterwards, and is deliberately
/// opaque to `Debug` so it can never end up in a log line.
#[derive(Clone, PartialEq, Eq)]
pub struct KeySchedule {
    s: [u16; TABLE_WORDS],
}

impl KeySchedule {
    /// Expand a 16-byte key into the 26-word round-key table.
    ///
    /// Pure function of the key: all additions are mod 2^16 and every
    /// rotate amount is taken mod 16 (`rotate_left` on `u16` wraps).
    pub fn derive(key: &[u8; KEY_BYTES]) -> Self {
        // Pack the key into 8 words, low byte first within each word.
        let mut l = [0u16; KEY_WORDS];
        for i in (0..KEY_BYTES).rev() {
            l[i / 2] = l[i / 2].rotate_left(8).wrapping_add(u16::from(key[i]));
        }

        let mut s = [0u16; TABLE_WORDS];
        s[0] = P16;
        for i in 1..TABLE_WORDS {
            s[i] = s[i - 1].wrapping_add(Q16);
        }

        // 3 * t mixing passes over S and L.
        let (mut a, mut b) = (0u16, 0u16);
        let (mut i, mut j) = (0usize, 0usize);
        for _ in 0..3 * TABLE_WORDS {
            a = s[i].wrapping_add(a).wrapping_add(b).rotate_left(3);
            s[i] = a;
            let ab = a.wrapping_add(b);
            b = l[j].wrapping_add(ab).rotate_left(u32::from(ab));
            l[j] = b;
            i = (i + 1) % TABLE_WORDS;
            j = (j + 1) % KEY_WORDS;
        }

        Self { s }
    }

    /// Encrypt one two-word block.
    pub fn encrypt(&self, block: (u16, u16)) -> (u16, u16) {
        let mut a = block.0.wrapping_add(self.s[0]);
        let mut b = block.1.wrapping_add(self.s[1]);
        for round in 1..=ROUNDS {
            a = (a ^ b)
                .rotate_left(u32::from(b))
                .wrapping_add(self.s[2 * round]);
            b = (b ^ a)
                .rotate_left(u32::from(a))
                .wrapping_add(self.s[2 * round + 1]);
        }
        (a, b)
    }

    /// Decrypt one two-word block. Exact algebraic inverse of [`Self::encrypt`].
    pub fn decrypt(&self, block: (u16, u16)) -> (u16, u16) {
        let (mut a, mut b) = block;
        for round in (1..=ROUNDS).rev() {
            b = b
                .wrapping_sub(self.s[2 * round + 1])
                .rotate_right(u32::from(a))
                ^ a;
            a = a
                .wrapping_sub(self.s[2 * round])
                .rotate_right(u32::from(b))
                ^ b;
        }
        (a.wrapping_sub(self.s[0]), b.wrapping_sub(self.s[1]))
    }
}

impl fmt::Debug for KeySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeySchedule(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic byte stream for sweeping keys and plaintexts.
    fn xorshift_bytes(seed: u64, len: usize) -> Vec<u8> {
        let mut x = seed | 1;
        (0..len)
            .map(|_| {
                x ^= x << 13;
                x ^= x >> 7;
                x ^= x << 17;
                (x & 0xFF) as u8
            })
            .collect()
    }

    #[test]
    fn test_roundtrip_zero_key() {
        let schedule = KeySchedule::derive(&[0u8; 16]);
        for pt in [(0u16, 0u16), (1, 2), (0xFFFF, 0xFFFF), (0xB7E1, 0x9E37)] {
            let ct = schedule.encrypt(pt);
            assert_eq!(schedule.decrypt(ct), pt);
        }
    }

    #[test]
    fn test_roundtrip_sweep() {
        for seed in 1..=32u64 {
            let key_bytes = xorshift_bytes(seed, 16);
            let mut key = [0u8; 16];
            key.copy_from_slice(&key_bytes);
            let schedule = KeySchedule::derive(&key);

            let words = xorshift_bytes(seed.wrapping_mul(31), 8);
            let pt = (
                u16::from_be_bytes([words[0], words[1]]),
                u16::from_be_bytes([words[2], words[3]]),
            );
            let ct = schedule.encrypt(pt);
            assert_eq!(schedule.decrypt(ct), pt);
        }
    }

    #[test]
    fn test_schedule_is_deterministic() {
        let key = *b"0123456789abcdef";
        let a = KeySchedule::derive(&key);
        let b = KeySchedule::derive(&key);
        assert_eq!(a, b);
        assert_eq!(a.encrypt((0x1234, 0x5678)), b.encrypt((0x1234, 0x5678)));
    }

    #[test]
    fn test_encrypt_is_not_identity() {
        let schedule = KeySchedule::derive(&[0u8; 16]);
        assert_ne!(schedule.encrypt((0, 0)), (0, 0));
    }

    #[test]
    fn test_debug_does_not_leak_schedule() {
        let schedule = KeySchedule::derive(&[0xAA; 16]);
        assert_eq!(format!("{schedule:?}"), "KeySchedule(..)");
    }
}
