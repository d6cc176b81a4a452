// Payload sampling: full output on failure, first few bytes on success

use std::borrow::Cow;

/// Payloads longer than this are truncated when the call succeeded
pub const FEW: usize = 64;

/// Appended to truncated payloads
pub const CONTINUATION: &[u8] = b"...";

/// Returns the first few bytes of data, followed by `...` if anything was cut
pub fn first_few_bytes(data: &[u8]) -> Cow<'_, [u8]> {
    if data.len() <= FEW {
        return Cow::Borrowed(data);
    }
    let mut few = Vec::with_capacity(FEW + CONTINUATION.len());
    few.extend_from_slice(&data[..FEW]);
    few.extend_from_slice(CONTINUATION);
    Cow::Owned(few)
}

/// Returns the full data if the call failed, otherwise its first few bytes
pub fn output<'a, E: ?Sized>(data: &'a [u8], err: Option<&E>) -> Cow<'a, [u8]> {
    match err {
        Some(_) => Cow::Borrowed(data),
        None => first_few_bytes(data),
    }
}
