//! Protocol constants

/// Symbols used for peer identifiers (digits and upper-case ASCII letters)
pub const ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Default peer identifier length
pub const DEFAULT_ID_LENGTH: usize = 5;

/// Shortest identifier length accepted in configuration
pub const MIN_ID_LENGTH: usize = 4;

/// Longest identifier length accepted in configuration
pub const MAX_ID_LENGTH: usize = 16;

/// Default listening port
pub const DEFAULT_PORT: u16 = 5000;

/// Default per-connection outbound queue depth
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

