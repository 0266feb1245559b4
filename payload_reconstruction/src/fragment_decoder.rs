use crate::error::DecodeError;

/// Decode a hex encoded fragment payload.
///
/// The first byte is the message type tag and is dropped.  Trailing `0x00` padding is removed; no other
/// bytes are trimmed, so binary content passes through unchanged.  An empty payload decodes to nothing.
pub fn try_decode_fragment(payload: &str) -> Result<Vec<u8>, DecodeError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    if payload.len() < 2 {
        return Err(DecodeError::TooShort(payload.len()));
    }
    if payload.len() % 2 != 0 {
        return Err(DecodeError::OddLength(payload.len()));
    }

    let mut bytes = hex::decode(payload)?;
    bytes.remove(0);

    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    bytes.truncate(end);

    Ok(bytes)
}
