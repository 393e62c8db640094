//! Draft-76 challenge key decoding.
//!
//! A key such as `"4 @1  46546xW%0l 1 5"` hides a 32-bit number: the
//! decimal digits read in order, divided by the count of ASCII spaces.

use crate::error::HandshakeError;

/// Decodes a `Sec-WebSocket-Key1`/`Key2` header value.
///
/// # Errors
///
/// - [`HandshakeError::MalformedKey`] if the key has no spaces or the
///   digit number is not an integral multiple of the space count.
/// - [`HandshakeError::KeyOutOfRange`] if the key has no digits, the digit
///   number overflows `u64`, or the quotient does not fit in `u32`.
pub fn parse_key(key: &str) -> Result<u32, HandshakeError> {
    let spaces = key.bytes().filter(|b| *b == b' ').count() as u64;
    let digits: String = key.chars().filter(char::is_ascii_digit).collect();

    if digits.is_empty() {
        return Err(HandshakeError::KeyOutOfRange(format!(
            "no digits in key {key:?}"
        )));
    }
    let key_number: u64 = digits
        .parse()
        .map_err(|_| HandshakeError::KeyOutOfRange(format!("key number {digits} overflows")))?;

    if spaces == 0 || key_number % spaces != 0 {
        return Err(HandshakeError::MalformedKey { key_number, spaces });
    }

    let value = key_number / spaces;
    u32::try_from(value)
        .map_err(|_| HandshakeError::KeyOutOfRange(format!("key value {value} exceeds 32 bits")))
}
