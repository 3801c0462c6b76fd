//! Indexed address topics.
//!
//! An indexed `address` parameter is stored in a log topic as a 32-byte word with
//! the address in the low 20 bytes and 12 bytes of zero padding in front. Decoding
//! checks the padding instead of blindly slicing the low bytes, so a non-standard
//! encoding is reported rather than silently turned into a wrong address.

use alloy::primitives::{Address, B256};

/// Number of zero bytes preceding an address in a topic word.
pub const ADDRESS_PADDING: usize = 12;

/// A topic word whose high-order bytes are not zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[display("topic {word} is not a left-padded address")]
pub struct PaddingError {
    pub word: B256,
}

impl std::error::Error for PaddingError {}

/// Encodes an address as an indexed topic.
#[must_use]
#[inline]
pub fn encode_address(address: Address) -> B256 {
    address.into_word()
}

/// Decodes an indexed address topic, rejecting words with non-zero padding.
pub fn decode_address(word: &B256) -> Result<Address, PaddingError> {
    if word[..ADDRESS_PADDING].iter().any(|byte| *byte != 0) {
        return Err(PaddingError { word: *word });
    }
    Ok(Address::from_slice(&word[ADDRESS_PADDING..]))
}
