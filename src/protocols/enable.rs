//! Entering privileged ("enable") mode.

use std::time::Duration;

use tracing::info;

use super::get_prompt;
use crate::conn::{CaptureSink, ConnWrapper};
use crate::errors::ExpectError;
use crate::expect::{defaults, expect, matcher, Matcher};
use crate::hexdump::hexdump_if_needed;

/// Send `enable_cmd` (default `"enable"`) and answer its password prompt.
///
/// H3C switches sometimes respond to `enable` with `User privilege level
/// is ...` instead of a password prompt when the account already has
/// sufficient privilege; that string is appended to the password-prompt
/// matcher's pattern list so it's treated the same as already being done.
pub fn with_enable(
    conn: &mut ConnWrapper,
    enable_cmd: &[u8],
    password_prompts: &[Vec<u8>],
    password: &[u8],
    enable_prompts: &[Vec<u8>],
) -> Result<Vec<u8>, ExpectError> {
    let enable_cmd: &[u8] = if enable_cmd.is_empty() {
        defaults::DEFAULT_ENABLE_CMD.as_bytes()
    } else {
        enable_cmd
    };
    conn.sendln(enable_cmd)?;

    let password_prompts: Vec<Vec<u8>> = if password_prompts.is_empty() {
        defaults::str_prompts(defaults::DEFAULT_PASSWORD_PROMPTS)
    } else {
        password_prompts.to_vec()
    };
    let enable_prompts: Vec<Vec<u8>> = if enable_prompts.is_empty() {
        defaults::str_prompts(defaults::DEFAULT_PROMPTS)
    } else {
        enable_prompts.to_vec()
    };

    let sink = CaptureSink::new();
    let (_r, _w) = conn.set_tee_output(sink.clone());

    if !defaults::is_none_password(password) {
        let is_prompt = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = is_prompt.clone();
        let prompt_matcher = matcher(
            enable_prompts.clone(),
            Box::new(move |_conn: &mut ConnWrapper, _bs: &[u8], _idx: usize| {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(false)
            }),
        );

        let mut combined_password_prompts = password_prompts.clone();
        combined_password_prompts.push(defaults::H3C_SUPER_RESPONSE.as_bytes().to_vec());
        let password = password.to_vec();
        let password_matcher = matcher(
            combined_password_prompts,
            Box::new(move |conn: &mut ConnWrapper, _bs: &[u8], _idx: usize| {
                let pw = if defaults::is_empty_password(&password) {
                    Vec::new()
                } else {
                    password.clone()
                };
                conn.send_password(&pw)?;
                Ok(false)
            }),
        );

        expect(conn, &[&prompt_matcher as &dyn Matcher, &password_matcher as &dyn Matcher])?;

        if is_prompt.load(std::sync::atomic::Ordering::SeqCst) {
            conn.drain_off(Duration::from_secs(5))
                .map_err(|e| ExpectError::Other(format!("read prompt failed, drain off, {e}")))?;

            let output = sink.bytes();
            if output.is_empty() {
                return Err(ExpectError::Other("read prompt failed, received is empty".into()));
            }

            let prompt = get_prompt(&output, &enable_prompts).ok_or_else(|| {
                ExpectError::Other(format!(
                    "read prompt failed: \r\n{}",
                    hexdump_if_needed(&output)
                ))
            })?;
            info!(prompt = %String::from_utf8_lossy(&prompt), "entered enable mode");
            return Ok(prompt);
        }
    }

    let prompt = super::read_prompt(conn, &enable_prompts, &[])?;
    info!(prompt = %String::from_utf8_lossy(&prompt), "entered enable mode");
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::Pipe;
    use crate::transport::test_support::RecordingTransport;
    use std::sync::Arc;

    fn conn_with_bytes(bytes: &[u8]) -> (ConnWrapper, RecordingTransport) {
        let pipe = Arc::new(Pipe::new(0));
        pipe.write(bytes).unwrap();
        let transport = RecordingTransport::default();
        (ConnWrapper::new(pipe, Box::new(transport.clone())), transport)
    }

    #[test]
    fn with_enable_sends_password_and_returns_prompt() {
        let (mut conn, transport) = conn_with_bytes(b"Password: switch#");
        let prompt = with_enable(&mut conn, b"", &[], b"secret", &[]).unwrap();
        assert_eq!(prompt, b"switch#");
        assert_eq!(*transport.written.lock().unwrap(), b"enable\n");
        assert_eq!(*transport.passwords_sent.lock().unwrap(), vec![b"secret".to_vec()]);
    }

    #[test]
    fn with_enable_skips_password_for_none_sentinel() {
        let (mut conn, _t) = conn_with_bytes(b"switch#");
        let prompt = with_enable(&mut conn, b"", &[], b"<<none>>", &[]).unwrap();
        assert_eq!(prompt, b"switch#");
    }
}
