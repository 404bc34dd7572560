//! Resolving a script literal's optional `CHARSET"..."` tag to bytes.
//!
//! The original supports GBK/Big5/UTF-16/HZ-GB2312 via `golang.org/x/text`.
//! Pulling in a full Chinese-encodings crate is out of scope here; instead
//! this is a small injection seam — [`TriggerEncoder`] — so a consumer that
//! genuinely needs one of those charsets can supply an encoder for it
//! without this crate depending on it. The built-in [`Utf8Encoder`] covers
//! the common case (no charset tag, or an explicit `utf8`/`utf-8` tag).

/// Encode a string literal tagged with `charset` into the bytes that should
/// actually be sent to the device.
pub trait TriggerEncoder: Send + Sync {
    fn encode(&self, charset: &str, text: &str) -> Result<Vec<u8>, String>;
}

/// Accepts only the empty tag and `utf8`/`utf-8`; anything else is an
/// unknown-charset error, same as the original's `toBytes` default branch.
pub struct Utf8Encoder;

impl TriggerEncoder for Utf8Encoder {
    fn encode(&self, charset: &str, text: &str) -> Result<Vec<u8>, String> {
        match charset.to_ascii_lowercase().as_str() {
            "" | "utf8" | "utf-8" => Ok(text.as_bytes().to_vec()),
            other => Err(format!("charset '{other}' is unknown")),
        }
    }
}
