//! Session ID generation for stores that keep payloads server-side.

use rand::RngCore;

/// RFC 4648 base32 alphabet.
const BASE32_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Number of random bytes behind every ID.
pub const ID_BYTES: usize = 32;

/// Generate an opaque, filename-safe ID from [`ID_BYTES`] random bytes,
/// base32 encoded without padding.
pub fn generate_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base32_encode(&bytes)
}

/// True when `id` could have come from [`generate_id`].
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| BASE32_ALPHABET.contains(&b))
}

/// Base32 without padding.
fn base32_encode(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len().div_ceil(5) * 8);
    let mut bits = 0u32;
    let mut bit_count = 0u8;

    for &byte in data {
        bits = (bits << 8) | u32::from(byte);
        bit_count += 8;

        while bit_count >= 5 {
            bit_count -= 5;
            let index = ((bits >> bit_count) & 0x1F) as usize;
            result.push(BASE32_ALPHABET[index] as char);
        }
    }

    if bit_count > 0 {
        let index = ((bits << (5 - bit_count)) & 0x1F) as usize;
        result.push(BASE32_ALPHABET[index] as char);
    }

    result
}
