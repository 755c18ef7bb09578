//! RLP (Recursive Length Prefix) encoding for EmberVM
//!
//! The interpreter needs RLP for exactly one thing: the
//! `rlp([sender, nonce])` preimage of contract address derivation. This
//! crate wraps the `rlp` crate for that purpose and re-exports its types
//! for hosts that serialize more.
//!
//! ## RLP encoding rules
//!
//! - Single byte `[0x00, 0x7f]`: itself
//! - Short string (0-55 bytes): `0x80 + len` + data
//! - Long string (>55 bytes): `0xb7 + len_of_len` + len + data
//! - Short list (0-55 bytes payload): `0xc0 + len` + items
//! - Long list (>55 bytes payload): `0xf7 + len_of_len` + len + items

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export the rlp crate for direct use
pub use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

/// Encodes a value to RLP bytes.
pub fn encode<T: Encodable>(value: &T) -> Vec<u8> {
    rlp::encode(value).to_vec()
}

/// Decodes RLP bytes to a value.
pub fn decode<T: Decodable>(data: &[u8]) -> Result<T, DecoderError> {
    rlp::decode(data)
}

/// Encodes the two-item list `[sender, nonce]` used for contract address
/// derivation.
///
/// The nonce is emitted with no leading zero bytes; nonce 0 encodes as the
/// empty string.
pub fn encode_address_nonce(sender: &[u8; 20], nonce: u64) -> Vec<u8> {
    let mut stream = RlpStream::new_list(2);
    stream.append(&sender.to_vec());
    if nonce == 0 {
        stream.append_empty_data();
    } else {
        stream.append(&nonce);
    }
    stream.out().to_vec()
}

/// Minimal-byte integer helpers matching the RLP integer convention.
pub mod utils {
    use bytes::{BufMut, BytesMut};

    /// Encodes a u64 with minimal bytes (no leading zeros).
    pub fn encode_u64(value: u64) -> Vec<u8> {
        if value == 0 {
            return vec![0x80]; // empty string
        }
        if value < 128 {
            return vec![value as u8];
        }

        let mut buf = BytesMut::with_capacity(9);
        let bytes = value.to_be_bytes();
        let start = bytes.iter().position(|&b| b != 0).unwrap_or(8);
        buf.put_u8(0x80 + (8 - start) as u8);
        buf.put_slice(&bytes[start..]);
        buf.to_vec()
    }
}
