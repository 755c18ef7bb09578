//! Ethereum-style addresses
//!
//! An address is a 256-bit word in which only the low 160 bits carry
//! identity. Every operation that produces an address masks it, so plain
//! equality on the masked values is address equality.

use crate::U256;

/// A 160-bit account address carried in a 256-bit word.
pub type Address = U256;

/// Masks a word down to its low 160 bits.
pub fn to_address(value: U256) -> Address {
    let bytes = value.to_be_bytes();
    let mut masked = [0u8; 32];
    masked[12..].copy_from_slice(&bytes[12..]);
    U256::from_be_bytes(masked)
}

/// The 20 significant bytes of an address, big-endian.
pub fn address_bytes(address: Address) -> [u8; 20] {
    let bytes = address.to_be_bytes();
    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes[12..]);
    out
}
