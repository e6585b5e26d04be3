pub mod decimals;
pub mod time;

pub use decimals::{format_bigdecimal, is_zero, safe_div};
pub use time::{day_bucket, hour_bucket, SECONDS_PER_DAY, SECONDS_PER_HOUR};

use num_bigint::BigInt as NumBigInt;
use substreams::scalar::BigInt;

/// Sentinel used wherever an address could not be resolved
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Canonical entity-id form of an address: lowercase hex with a 0x prefix.
///
/// Returns `None` when the input is not 20 bytes of hex, so callers can
/// substitute [`ZERO_ADDRESS`] explicitly.
pub fn normalize_address(address: &str) -> Option<String> {
    let trimmed = address
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    match hex::decode(trimmed) {
        Ok(bytes) if bytes.len() == 20 => Some(format!("0x{}", hex::encode(bytes))),
        _ => None,
    }
}

#[inline]
pub fn is_zero_address(address: &str) -> bool {
    address.eq_ignore_ascii_case(ZERO_ADDRESS)
}

/// Convert unsigned uint256 bytes to BigInt
///
/// ## EVM Integer Storage:
/// - Integers in the EVM are stored as 32-byte (256-bit) big-endian words
///
/// ## Returns:
/// - The BigInt representation of the uint256 value, or 0 if invalid input
#[inline]
pub fn uint256_to_bigint(bytes: &[u8]) -> BigInt {
    if bytes.len() != 32 {
        return BigInt::zero();
    }

    let bigint = NumBigInt::from_bytes_be(num_bigint::Sign::Plus, bytes);
    BigInt::from(bigint)
}

/// Read a uint256 word as u64, `None` if it does not fit
///
/// Used for small return values such as `decimals()`.
pub fn word_to_u64(bytes: &[u8]) -> Option<u64> {
    if bytes.len() != 32 {
        return None;
    }

    if bytes[..24].iter().any(|byte| *byte != 0) {
        return None;
    }

    let mut tail = [0u8; 8];
    tail.copy_from_slice(&bytes[24..]);
    Some(u64::from_be_bytes(tail))
}

/// Convert an address stored in a 32-byte word to its 0x-prefixed hex form
///
/// ## Why the last 20 bytes:
/// - Addresses are 160 bits and right-aligned in an ABI word
pub fn word_to_address(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 32 {
        return None;
    }

    // address is stored in the last 20 bytes of the 32-byte word
    let start = bytes.len().saturating_sub(20);
    Some(format!("0x{}", hex::encode(&bytes[start..])))
}

/// Decode an ABI-encoded `string` return value
///
/// ## Layouts handled:
/// - Dynamic string: offset word, length word, then the UTF-8 payload
/// - Legacy `bytes32` (e.g. MKR `symbol()`): a single right-padded word
pub fn decode_abi_string(data: &[u8]) -> Option<String> {
    if data.len() == 32 {
        let end = data.iter().position(|byte| *byte == 0).unwrap_or(32);
        return String::from_utf8(data[..end].to_vec()).ok();
    }

    let offset = usize::try_from(word_to_u64(data.get(0..32)?)?).ok()?;
    let length_end = offset.checked_add(32)?;
    let length = usize::try_from(word_to_u64(data.get(offset..length_end)?)?).ok()?;
    let payload = data.get(length_end..length_end.checked_add(length)?)?;

    String::from_utf8(payload.to_vec()).ok()
}
