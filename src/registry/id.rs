//! Peer identifier allocation

use rand::Rng;

use crate::protocol::constants::{ID_ALPHABET, MAX_ID_LENGTH, MIN_ID_LENGTH};

use super::peer::PeerId;

/// Generates fixed-length alphanumeric identifiers
#[derive(Debug, Clone, Copy)]
pub struct IdAllocator {
    length: usize,
}

impl IdAllocator {
    /// Create an allocator; the length is clamped to the supported range
    pub fn new(length: usize) -> Self {
        Self {
            length: length.clamp(MIN_ID_LENGTH, MAX_ID_LENGTH),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Draw identifiers until one is not `taken`
    ///
    /// Never returns on an exhausted id space; 36^length dwarfs any
    /// realistic number of concurrent connections.
    pub fn allocate(&self, taken: impl Fn(&str) -> bool) -> PeerId {
        let mut rng = rand::thread_rng();
        loop {
            let candidate: String = (0..self.length)
                .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
                .collect();

            if !taken(&candidate) {
                return PeerId::from(candidate);
            }

            tracing::trace!(candidate = %candidate, "Peer ID collision, retrying");
        }
    }
}
