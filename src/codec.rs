//! JSON codec boundary.
//!
//! `serde_json` is used as a black box. Compact output never contains a raw
//! newline, so with the default delimiter a serialized value is always exactly
//! one line. Decoder failures are turned into plain reasons here so nothing
//! panics or unwinds into the dispatch loop.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::EncodeError;

/// Serialize `value` into compact JSON bytes (no delimiter appended).
pub fn encode<S>(value: &S) -> Result<Vec<u8>, EncodeError>
where
    S: Serialize + ?Sized,
{
    Ok(serde_json::to_vec(value)?)
}

/// Serialize `value` and append `delimiter`, refusing payloads that would
/// split on the wire.
pub fn encode_line<S>(value: &S, delimiter: &[u8]) -> Result<Vec<u8>, EncodeError>
where
    S: Serialize + ?Sized,
{
    let mut frame = encode(value)?;
    if contains(&frame, delimiter) {
        return Err(EncodeError::DelimiterInPayload {
            delimiter: String::from_utf8_lossy(delimiter).into_owned(),
        });
    }
    frame.extend_from_slice(delimiter);
    Ok(frame)
}

/// Decode one line. On failure returns the reason only; the caller pairs it
/// with the raw line.
pub fn decode<T>(line: &[u8]) -> Result<T, String>
where
    T: DeserializeOwned,
{
    let text = std::str::from_utf8(line).map_err(|e| format!("invalid UTF-8: {}", e))?;
    serde_json::from_str(text).map_err(|e| e.to_string())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}
