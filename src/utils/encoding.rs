//! Portal page decoding
//!
//! The portals serve a mix of UTF-8 and legacy Chinese charsets, often
//! without a usable `charset` header. Candidates are tried strictly in order
//! and the first one that decodes without replacement wins.

use encoding_rs::{Encoding, GB18030, GBK, UTF_8};
use tracing::trace;

/// Strict candidates, tried before the latin-1 fallback
///
/// GB2312 is a subset of GBK, so the GBK pass covers it.
fn candidates() -> [&'static Encoding; 3] {
    [UTF_8, GBK, GB18030]
}

/// Decode a response body into text
///
/// Falls back to latin-1, which maps every byte to a code point and so
/// never fails.
pub fn decode_text(bytes: &[u8]) -> String {
    for encoding in candidates() {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            trace!(charset = encoding.name(), "Decoded portal page");
            return text.into_owned();
        }
    }

    trace!("Decoded portal page as latin-1");
    bytes.iter().map(|&b| char::from(b)).collect()
}
