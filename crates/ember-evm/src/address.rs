//! Contract address derivation

use ember_crypto::keccak256;
use ember_primitives::{address_bytes, to_address, Address, U256};
use ember_rlp::encode_address_nonce;

/// Derives the address of a contract created by `sender` at `nonce`:
/// the low 160 bits of `keccak256(rlp([sender, nonce]))`.
pub fn create_address(sender: Address, nonce: u64) -> Address {
    let encoding = encode_address_nonce(&address_bytes(sender), nonce);
    let hash = keccak256(&encoding);
    to_address(U256::from_big_endian(&hash[12..]))
}
