//! Data-chunk serialization.
//!
//! Outbound chunks are `[header][cipher_group]*`. The header is the
//! plaintext length in ack mode, or the rolling counter followed by the
//! length in notify mode. Only 4-byte groups fully contained in the chunk
//! are encrypted and emitted; a 1-3 byte trailing remainder produces no
//! ciphertext, so a chunk shorter than one group goes out header-only.
//! The peripheral accepts that degenerate shape, and this codec reproduces
//! it rather than padding the group.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use super::constants::{ACK_HEADER_LEN, CIPHER_GROUP_SIZE, MAX_CHUNK_LEN, NOTIFY_HEADER_LEN};
use super::{TransferMode, WireError};
use crate::cipher::KeySchedule;
use crate::plan::TransferPlan;

/// Serialize one chunk of the image into its wire form.
///
/// `counter` is `Some` in notify mode and `None` in ack mode. The caller
/// hands in indices that lie within the plan.
pub fn encode_chunk(
    plan: &TransferPlan,
    schedule: &KeySchedule,
    image: &[u8],
    block: usize,
    chunk: usize,
    counter: Option<u8>,
) -> Vec<u8> {
    let plaintext = &image[plan.chunk_range(block, chunk)];
    debug_assert!(plaintext.len() <= MAX_CHUNK_LEN);

    let mut wire = Vec::with_capacity(NOTIFY_HEADER_LEN + plaintext.len());
    if let Some(counter) = counter {
        wire.push(counter);
    }
    wire.push(plaintext.len() as u8);

    // chunks_exact drops the trailing remainder by construction.
    for group in plaintext.chunks_exact(CIPHER_GROUP_SIZE) {
        let (c0, c1) = schedule.encrypt((
            BigEndian::read_u16(&group[..2]),
            BigEndian::read_u16(&group[2..]),
        ));
        wire.write_u16::<BigEndian>(c0).unwrap();
        wire.write_u16::<BigEndian>(c1).unwrap();
    }
    wire
}

/// A chunk recovered from its wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedChunk {
    /// Counter from the header (notify mode only).
    pub counter: Option<u8>,
    /// Plaintext length the header declared.
    pub declared_len: usize,
    /// Recovered plaintext, a whole number of cipher groups. Shorter than
    /// `declared_len` when the sender dropped a trailing remainder.
    pub plaintext: Vec<u8>,
}

impl DecodedChunk {
    /// Bytes the header declared but the ciphertext does not carry.
    pub fn dropped_bytes(&self) -> usize {
        self.declared_len - self.plaintext.len()
    }
}

/// Parse and decrypt a wire chunk. Inverse of [`encode_chunk`] up to the
/// unrecoverable trailing remainder.
pub fn decode_chunk(
    schedule: &KeySchedule,
    mode: TransferMode,
    bytes: &[u8],
) -> Result<DecodedChunk, WireError> {
    let header_len = match mode {
        TransferMode::Ack => ACK_HEADER_LEN,
        TransferMode::Notify => NOTIFY_HEADER_LEN,
    };
    if bytes.len() < header_len {
        return Err(WireError::ShortChunk {
            actual: bytes.len(),
            needed: header_len,
        });
    }

    let (counter, declared_len) = match mode {
        TransferMode::Ack => (None, bytes[0] as usize),
        TransferMode::Notify => (Some(bytes[0]), bytes[1] as usize),
    };

    let body = &bytes[header_len..];
    let expected_body = declared_len / CIPHER_GROUP_SIZE * CIPHER_GROUP_SIZE;
    if body.len() != expected_body {
        return Err(WireError::BodyLengthMismatch {
            declared: declared_len,
            actual: body.len(),
        });
    }

    let mut plaintext = Vec::with_capacity(body.len());
    for group in body.chunks_exact(CIPHER_GROUP_SIZE) {
        let (p0, p1) = schedule.decrypt((
            BigEndian::read_u16(&group[..2]),
            BigEndian::read_u16(&group[2..]),
        ));
        plaintext.write_u16::<BigEndian>(p0).unwrap();
        plaintext.write_u16::<BigEndian>(p1).unwrap();
    }

    Ok(DecodedChunk {
        counter,
        declared_len,
        plaintext,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(image_len: usize, budget: usize) -> (TransferPlan, KeySchedule, Vec<u8>) {
        let plan = TransferPlan::compute(image_len, 4, budget).unwrap();
        let schedule = KeySchedule::derive(&[0u8; 16]);
        let image: Vec<u8> = (0..image_len as u8).collect();
        (plan, schedule, image)
    }

    #[test]
    fn test_ack_header_carries_length() {
        let (plan, schedule, image) = fixture(10, 8);
        let wire = encode_chunk(&plan, &schedule, &image, 0, 0, None);
        assert_eq!(wire[0], 8);
        assert_eq!(wire.len(), 1 + 8);
    }

    #[test]
    fn test_notify_header_carries_counter_and_length() {
        let (plan, schedule, image) = fixture(10, 8);
        let wire = encode_chunk(&plan, &schedule, &image, 0, 0, Some(5));
        assert_eq!(&wire[..2], &[5, 8]);
        assert_eq!(wire.len(), 2 + 8);
    }

    #[test]
    fn test_sub_group_chunk_is_header_only() {
        // Blocks of 4 over a 10-byte image leave a 2-byte final block; its
        // sole chunk must serialize to exactly the length header.
        let (plan, schedule, image) = fixture(10, 4);
        let wire = encode_chunk(&plan, &schedule, &image, 2, 0, None);
        assert_eq!(wire, vec![0x02]);
    }

    #[test]
    fn test_trailing_remainder_is_dropped() {
        // A 6-byte chunk carries one group; bytes 4..6 never hit the wire.
        let plan = TransferPlan::compute(6, 8, 8).unwrap();
        let schedule = KeySchedule::derive(&[0u8; 16]);
        let image: Vec<u8> = (0..6).collect();
        let wire = encode_chunk(&plan, &schedule, &image, 0, 0, None);
        assert_eq!(wire[0], 6);
        assert_eq!(wire.len(), 1 + CIPHER_GROUP_SIZE);
    }

    #[test]
    fn test_ciphertext_differs_from_plaintext() {
        let (plan, schedule, image) = fixture(8, 8);
        let wire = encode_chunk(&plan, &schedule, &image, 0, 0, None);
        assert_ne!(&wire[1..], &image[..]);
    }

    #[test]
    fn test_decode_inverts_encode() {
        let (plan, schedule, image) = fixture(10, 8);
        let wire = encode_chunk(&plan, &schedule, &image, 0, 0, Some(1));
        let decoded = decode_chunk(&schedule, TransferMode::Notify, &wire).unwrap();
        assert_eq!(decoded.counter, Some(1));
        assert_eq!(decoded.declared_len, 8);
        assert_eq!(decoded.plaintext, &image[..8]);
        assert_eq!(decoded.dropped_bytes(), 0);
    }

    #[test]
    fn test_decode_reports_dropped_remainder() {
        let (plan, schedule, image) = fixture(10, 8);
        let wire = encode_chunk(&plan, &schedule, &image, 1, 0, None);
        let decoded = decode_chunk(&schedule, TransferMode::Ack, &wire).unwrap();
        assert_eq!(decoded.declared_len, 2);
        assert!(decoded.plaintext.is_empty());
        assert_eq!(decoded.dropped_bytes(), 2);
    }

    #[test]
    fn test_decode_rejects_truncated_body() {
        let (plan, schedule, image) = fixture(8, 8);
        let mut wire = encode_chunk(&plan, &schedule, &image, 0, 0, None);
        wire.pop();
        assert_eq!(
            decode_chunk(&schedule, TransferMode::Ack, &wire),
            Err(WireError::BodyLengthMismatch {
                declared: 8,
                actual: 7
            })
        );
    }

    #[test]
    fn test_decode_rejects_missing_header() {
        let schedule = KeySchedule::derive(&[0u8; 16]);
        assert_eq!(
            decode_chunk(&schedule, TransferMode::Notify, &[1]),
            Err(WireError::ShortChunk {
                actual: 1,
                needed: NOTIFY_HEADER_LEN
            })
        );
    }
}
