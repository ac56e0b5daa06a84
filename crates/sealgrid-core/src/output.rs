//! Result record layout.
//!
//! ```text
//! offset  0        8       10      13          16
//!         | id (8) | score | nonce | check (3) |
//! ```
//!
//! The id is a big-endian signed 64-bit item id, the score a big-endian
//! signed 16-bit value. The nonce only exists to make equal results
//! indistinguishable and is skipped. The check field used to detect
//! tampering is at most three bytes; anything past offset 16 is ignored.

use serde::{Deserialize, Serialize};

use crate::error::{JobError, JobResult};

const SCORE_OFFSET: usize = 8;
const CHECK_OFFSET: usize = 13;
const CHECK_END: usize = 16;

/// A decoded map, reduce, or finalize result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedOutput {
    pub id: i64,
    pub score: i16,
    pub check: Vec<u8>,
}

/// Decode a plaintext result record.
pub fn unpack_output(bytes: &[u8]) -> JobResult<DecodedOutput> {
    if bytes.len() < CHECK_OFFSET {
        return Err(JobError::TruncatedOutput(bytes.len()));
    }

    let mut id = [0u8; 8];
    id.copy_from_slice(&bytes[..SCORE_OFFSET]);
    let score = i16::from_be_bytes([bytes[SCORE_OFFSET], bytes[SCORE_OFFSET + 1]]);

    Ok(DecodedOutput {
        id: i64::from_be_bytes(id),
        score,
        check: bytes[CHECK_OFFSET..bytes.len().min(CHECK_END)].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpacks_fixed_layout() {
        let bytes = [
            0, 0, 0, 0, 0x12, 0x34, 0x56, 0x78, 0x31, 0x41, 0xCC, 0xCD, 0xCE, 0xBE, 0xEF, 0xFE,
        ];
        let out = unpack_output(&bytes).unwrap();
        assert_eq!(out.id, 0x12345678);
        assert_eq!(out.score, 0x3141);
        assert_eq!(out.check, vec![0xBE, 0xEF, 0xFE]);
    }

    #[test]
    fn negative_score_keeps_sign() {
        let mut bytes = vec![0u8; 16];
        bytes[8] = 0xFF;
        bytes[9] = 0x9C;
        assert_eq!(unpack_output(&bytes).unwrap().score, -100);
    }

    #[test]
    fn short_input_is_rejected() {
        assert_eq!(unpack_output(&[0; 12]), Err(JobError::TruncatedOutput(12)));
    }

    #[test]
    fn trailing_bytes_are_not_part_of_the_check() {
        let mut bytes = vec![0u8; 13];
        bytes.extend_from_slice(&[0xBE, 0xEF, 0xFE, 0x01, 0x02]);
        assert_eq!(unpack_output(&bytes).unwrap().check, vec![0xBE, 0xEF, 0xFE]);
    }

    #[test]
    fn empty_check_field_is_allowed() {
        let out = unpack_output(&[0; 13]).unwrap();
        assert!(out.check.is_empty());
    }
}
