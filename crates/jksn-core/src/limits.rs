//! Resource limits shared by the encoder and decoder.
//!
//! The decoder recurses once per container frame, so an attacker-controlled
//! stream could otherwise exhaust the stack with a few kilobytes of nested
//! array headers. The encoder enforces the same nesting limit so that every
//! stream it produces is accepted by a decoder configured identically.

/// Nesting and size limits for a codec session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum container nesting depth (arrays, objects, swapped arrays,
    /// pragmas and cache refreshers each count as one level).
    pub max_nesting_depth: usize,
    /// Maximum accepted input size in bytes for a single `parse` call.
    pub max_input_size: usize,
    /// Maximum number of column cells a single `parse` call may spread into
    /// rows of swapped arrays. A two-byte back-reference can stand for a
    /// long cached column, so this bounds the output independently of the
    /// input size.
    pub max_swapped_cells: usize,
}

impl Limits {
    /// Limits suited to trusted, locally produced data.
    pub const fn relaxed() -> Self {
        Self {
            max_nesting_depth: 256,
            max_input_size: 256 * 1024 * 1024, // 256 MiB
            max_swapped_cells: 1 << 24,
        }
    }

    /// Tighter limits for data received from untrusted peers.
    pub const fn strict() -> Self {
        Self {
            max_nesting_depth: 64,
            max_input_size: 16 * 1024 * 1024, // 16 MiB
            max_swapped_cells: 1 << 20,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::relaxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_relaxed() {
        assert_eq!(Limits::default(), Limits::relaxed());
        assert_eq!(Limits::default().max_nesting_depth, 256);
    }

    #[test]
    fn strict_is_tighter_than_relaxed() {
        let strict = Limits::strict();
        let relaxed = Limits::relaxed();
        assert!(strict.max_nesting_depth < relaxed.max_nesting_depth);
        assert!(strict.max_input_size < relaxed.max_input_size);
        assert!(strict.max_swapped_cells < relaxed.max_swapped_cells);
    }
}
