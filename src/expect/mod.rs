//! The pattern-match-and-respond loop: read until one of a set of prompts
//! appears, run that prompt's callback, and keep going until a callback
//! says to stop.
//!
//! Ported from the original's `Expect`/`Matcher`/`Match` trio. The biggest
//! type-system difference from the Go source is that `Match(prompts
//! interface{}, cb)` did a runtime type switch over `[]string`/`[][]byte`;
//! here callers build a `Vec<Vec<u8>>` up front via [`defaults::str_prompts`]
//! / [`defaults::byte_prompt`] and hand it to [`matcher`].

pub mod defaults;

use crate::conn::ConnWrapper;
use crate::errors::ExpectError;
use crate::hexdump::hexdump_if_needed;

/// A matcher's response to seeing its prompt: `Ok(true)` keeps the loop
/// going (the device asked a follow-up question), `Ok(false)` ends it.
pub type DoFunc = Box<dyn Fn(&mut ConnWrapper, &[u8], usize) -> Result<bool, ExpectError> + Send + Sync>;

/// One entry in an `Expect` call: a set of byte patterns and what to do
/// when the connection's trailing bytes match one of them.
pub trait Matcher: Send + Sync {
    fn prompts(&self) -> &[Vec<u8>];
    fn invoke(&self, conn: &mut ConnWrapper, recv: &[u8], idx: usize) -> Result<bool, ExpectError>;
}

pub struct SimpleMatcher {
    prompts: Vec<Vec<u8>>,
    action: DoFunc,
}

impl Matcher for SimpleMatcher {
    fn prompts(&self) -> &[Vec<u8>] {
        &self.prompts
    }

    fn invoke(&self, conn: &mut ConnWrapper, recv: &[u8], idx: usize) -> Result<bool, ExpectError> {
        (self.action)(conn, recv, idx)
    }
}

/// Build a matcher from a prompt list and a response callback.
pub fn matcher(prompts: Vec<Vec<u8>>, action: DoFunc) -> SimpleMatcher {
    SimpleMatcher { prompts, action }
}

const MAX_RETRY_COUNT: usize = 1000;

/// Read until one of `matchers`' (or the default catalog's) prompts
/// appears, run its callback, and repeat until a callback returns
/// `Ok(false)`.
///
/// Caps at [`MAX_RETRY_COUNT`] iterations to match the original's runaway
/// guard, and re-raises a literal `Network error: Connection timed out`
/// appearing in the received bytes as [`ExpectError::ProtocolTimeout`]
/// rather than a generic timeout (some transports report dial failures as
/// plain text rather than a read error).
pub fn expect(conn: &mut ConnWrapper, matchers: &[&dyn Matcher]) -> Result<(), ExpectError> {
    let default_catalog = defaults::default_matchers();

    let mut match_starts = Vec::with_capacity(matchers.len() + default_catalog.len());
    let mut prompts: Vec<Vec<u8>> = Vec::new();
    for m in matchers {
        match_starts.push(prompts.len());
        prompts.extend_from_slice(m.prompts());
    }
    for m in default_catalog {
        match_starts.push(prompts.len());
        prompts.extend_from_slice(m.prompts());
    }

    for _ in 0..MAX_RETRY_COUNT {
        let prompt_refs: Vec<&[u8]> = prompts.iter().map(Vec::as_slice).collect();
        let mut buf = Vec::new();
        match conn.read_until(&mut buf, &prompt_refs) {
            Err(e) => {
                if contains(&buf, b"Network error:") {
                    if contains(&buf, b"Connection timed out") {
                        return Err(ExpectError::ProtocolTimeout(hexdump_if_needed(&buf)));
                    }
                    return Err(ExpectError::Other(String::from_utf8_lossy(&buf).into_owned()));
                }
                return Err(ExpectError::Timeout {
                    expected: join_patterns(&prompts),
                    received: hexdump_if_needed(&buf),
                });
            }
            Ok(idx) => {
                let found = match_starts
                    .iter()
                    .enumerate()
                    .rev()
                    .find(|&(_, &start)| start <= idx)
                    .map(|(i, _)| i);
                let found = match found {
                    Some(f) => f,
                    None => {
                        return Err(ExpectError::Other(format!(
                            "read until '{}' failed, returned index {idx}",
                            join_patterns(&prompts)
                        )))
                    }
                };
                let local_idx = idx - match_starts[found];
                let more = if found < matchers.len() {
                    matchers[found].invoke(conn, &buf, local_idx)?
                } else {
                    default_catalog[found - matchers.len()].invoke(conn, &buf, local_idx)?
                };
                if !more {
                    return Ok(());
                }
            }
        }
    }

    Err(ExpectError::RetryExhausted {
        limit: MAX_RETRY_COUNT,
    })
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len().max(1)).any(|w| w == needle)
}

fn join_patterns(prompts: &[Vec<u8>]) -> String {
    prompts
        .iter()
        .map(|p| String::from_utf8_lossy(p).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}
