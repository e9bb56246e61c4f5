//! Digests for in-stream checksum frames.
//!
//! A checksum frame wraps exactly one value frame. The leading form
//! (`0xf0`..`0xf5`) stores the digest before the wrapped frame and the
//! trailing form (`0xf8`..`0xfd`) stores it after. The digest covers the
//! wrapped frame's bytes, including any pragmas or cache refreshers in front
//! of it. The low three bits of the control byte pick the algorithm.

use sha2::Digest;

/// Digest algorithm of a checksum frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    /// One-byte `h = h * 33 + b` hash, truncated to 8 bits after every byte.
    Djb,
    Crc32,
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

/// Where a checksum frame stores its digest relative to the wrapped frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    Leading,
    Trailing,
}

impl ChecksumAlgorithm {
    pub const ALL: [ChecksumAlgorithm; 6] = [
        ChecksumAlgorithm::Djb,
        ChecksumAlgorithm::Crc32,
        ChecksumAlgorithm::Md5,
        ChecksumAlgorithm::Sha1,
        ChecksumAlgorithm::Sha256,
        ChecksumAlgorithm::Sha512,
    ];

    /// Algorithm and placement named by a checksum control byte.
    pub fn from_control(control: u8) -> Option<(Self, Placement)> {
        let placement = match control {
            0xf0..=0xf5 => Placement::Leading,
            0xf8..=0xfd => Placement::Trailing,
            _ => return None,
        };
        let algorithm = *Self::ALL.get(usize::from(control & 0x07))?;
        Some((algorithm, placement))
    }

    /// Control byte introducing a frame with this algorithm and placement.
    pub fn control(self, placement: Placement) -> u8 {
        let base = match placement {
            Placement::Leading => 0xf0,
            Placement::Trailing => 0xf8,
        };
        base | self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ChecksumAlgorithm::Djb => "djb",
            ChecksumAlgorithm::Crc32 => "crc32",
            ChecksumAlgorithm::Md5 => "md5",
            ChecksumAlgorithm::Sha1 => "sha1",
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha512 => "sha512",
        }
    }

    /// Digest size in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            ChecksumAlgorithm::Djb => 1,
            ChecksumAlgorithm::Crc32 => 4,
            ChecksumAlgorithm::Md5 => 16,
            ChecksumAlgorithm::Sha1 => 20,
            ChecksumAlgorithm::Sha256 => 32,
            ChecksumAlgorithm::Sha512 => 64,
        }
    }

    /// Digest of `bytes` as stored on the wire (CRC-32 big-endian).
    pub fn digest(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            ChecksumAlgorithm::Djb => {
                vec![bytes
                    .iter()
                    .fold(0u8, |h, &b| h.wrapping_mul(33).wrapping_add(b))]
            }
            ChecksumAlgorithm::Crc32 => crc32fast::hash(bytes).to_be_bytes().to_vec(),
            ChecksumAlgorithm::Md5 => md5::Md5::digest(bytes).to_vec(),
            ChecksumAlgorithm::Sha1 => sha1::Sha1::digest(bytes).to_vec(),
            ChecksumAlgorithm::Sha256 => sha2::Sha256::digest(bytes).to_vec(),
            ChecksumAlgorithm::Sha512 => sha2::Sha512::digest(bytes).to_vec(),
        }
    }
}

/// Lowercase hex rendering used in checksum error messages.
pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
