//! Locating and waiting for a device prompt in captured output.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{split_lines, trim_nul_and_space};
use crate::conn::{CaptureSink, ConnWrapper};
use crate::errors::ExpectError;
use crate::expect::{defaults, expect, matcher, Matcher};
use crate::hexdump::hexdump_if_needed;

/// Find the last non-blank line in `bs` that ends with one of `prompts`,
/// trimmed of stray NULs/whitespace.
///
/// If that line's prompt is bracketed (its second-to-last byte is `]`,
/// e.g. `[admin@switch]#`), the returned prompt is widened back to the
/// opening `[` so later matches require the whole bracketed tag, not just
/// the trailing delimiter.
pub fn get_prompt(bs: &[u8], prompts: &[Vec<u8>]) -> Option<Vec<u8>> {
    if bs.is_empty() {
        return None;
    }

    for line in split_lines(bs).into_iter().rev() {
        let full_prompt = trim_nul_and_space(line);
        if full_prompt.is_empty() {
            continue;
        }
        for prompt in prompts {
            if full_prompt.ends_with(prompt.as_slice()) {
                if full_prompt.len() >= 2 && full_prompt[full_prompt.len() - 2] == b']' {
                    if let Some(open) = full_prompt.iter().rposition(|&b| b == b'[') {
                        if open > 0 {
                            return Some(full_prompt[open..].to_vec());
                        }
                    }
                }
                return Some(full_prompt.to_vec());
            }
        }
    }
    None
}

/// Read until one of `prompts` appears, then return the exact prompt text
/// seen (widened for bracketed prompts per [`get_prompt`]).
///
/// Retries up to 10 times if `Expect` returns without actually matching the
/// prompt entry (can happen when a caller-supplied extra matcher in
/// `matchers` keeps the loop going without ever completing it).
pub fn read_prompt(
    conn: &mut ConnWrapper,
    prompts: &[Vec<u8>],
    matchers: &[&dyn Matcher],
) -> Result<Vec<u8>, ExpectError> {
    let prompts: Vec<Vec<u8>> = if prompts.is_empty() {
        defaults::str_prompts(defaults::DEFAULT_PROMPTS)
    } else {
        prompts.to_vec()
    };

    let sink = CaptureSink::new();
    let (_r, _w) = conn.set_tee_output(sink.clone());

    for _ in 0..10 {
        let is_prompt = Arc::new(AtomicBool::new(false));
        let flag = is_prompt.clone();
        let mark = matcher(
            prompts.clone(),
            Box::new(move |_conn: &mut ConnWrapper, _bs: &[u8], _idx: usize| {
                flag.store(true, Ordering::SeqCst);
                Ok(false)
            }),
        );
        let mut all: Vec<&dyn Matcher> = vec![&mark];
        all.extend_from_slice(matchers);
        expect(conn, &all)?;

        if is_prompt.load(Ordering::SeqCst) {
            break;
        }
    }

    conn.drain_off(Duration::from_secs(1))
        .map_err(|e| ExpectError::Other(format!("read prompt failed, drain off, {e}")))?;

    let received = sink.bytes();
    if received.is_empty() {
        return Err(ExpectError::Other("read prompt failed, received is empty".into()));
    }

    get_prompt(&received, &prompts).ok_or_else(|| {
        ExpectError::Other(format!(
            "read prompt '{}' failed: \r\n{}",
            join(&prompts),
            hexdump_if_needed(&received)
        ))
    })
}

fn join(prompts: &[Vec<u8>]) -> String {
    prompts
        .iter()
        .map(|p| String::from_utf8_lossy(p).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_prompt_finds_trailing_delimiter_on_last_nonblank_line() {
        let bs = b"show version\r\nswitch#";
        let prompts = vec![b"#".to_vec(), b">".to_vec()];
        assert_eq!(get_prompt(bs, &prompts), Some(b"switch#".to_vec()));
    }

    #[test]
    fn get_prompt_widens_bracketed_prompt() {
        let bs = b"logged in\r\n[admin@switch]#";
        let prompts = vec![b"#".to_vec()];
        assert_eq!(get_prompt(bs, &prompts), Some(b"[admin@switch]#".to_vec()));
    }

    #[test]
    fn get_prompt_returns_none_when_no_line_matches() {
        let bs = b"no prompt here\r\njust text";
        let prompts = vec![b"#".to_vec()];
        assert_eq!(get_prompt(bs, &prompts), None);
    }

    #[test]
    fn get_prompt_on_empty_input_is_none() {
        assert_eq!(get_prompt(b"", &[b"#".to_vec()]), None);
    }
}
