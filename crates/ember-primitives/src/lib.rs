//! EmberVM Primitives
//!
//! Basic types shared by every layer of the interpreter:
//! - `U256`: 256-bit unsigned integer, the EVM's native word
//! - `Address`: alias for `U256` where only the low 160 bits carry identity

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod u256;

pub use address::{address_bytes, to_address, Address};
pub use u256::U256;

/// Errors from primitive operations
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    /// Slice length does not match the expected size
    #[error("invalid length: expected at most {expected} bytes, got {actual}")]
    InvalidLength {
        /// Maximum number of bytes accepted
        expected: usize,
        /// Number of bytes supplied
        actual: usize,
    },
    /// Invalid hexadecimal character in string
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
}
