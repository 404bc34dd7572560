//! Username/password login over an already-open connection.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::get_prompt;
use crate::conn::{CaptureSink, ConnWrapper};
use crate::errors::ExpectError;
use crate::expect::{defaults, expect, matcher, Matcher};
use crate::hexdump::hexdump_if_needed;

const STATUS_NONE: u8 = 0;
const STATUS_SENT_USERNAME: u8 = 1;
const STATUS_SENT_PASSWORD: u8 = 2;
const STATUS_AT_PROMPT: u8 = 3;
const STATUS_ERROR: u8 = 4;
const STATUS_PERMISSION_DENIED: u8 = 5;

/// Drive a login dialogue: answer the username prompt, then the password
/// prompt, then wait for the shell prompt. `extra` matchers (e.g. a host-key
/// acceptance question) are consulted alongside the five built-in ones.
///
/// Retries the whole `Expect` call up to 10 times, since some devices repeat
/// the login banner once per failed attempt before giving up for good.
pub fn user_login(
    conn: &mut ConnWrapper,
    user_prompts: &[Vec<u8>],
    username: &[u8],
    password_prompts: &[Vec<u8>],
    password: &[u8],
    prompts: &[Vec<u8>],
    extra: &[&dyn Matcher],
) -> Result<Vec<u8>, ExpectError> {
    let user_prompts: Vec<Vec<u8>> = if user_prompts.is_empty() {
        defaults::str_prompts(defaults::DEFAULT_USER_PROMPTS)
    } else {
        user_prompts.to_vec()
    };
    let password_prompts: Vec<Vec<u8>> = if password_prompts.is_empty() {
        defaults::str_prompts(defaults::DEFAULT_PASSWORD_PROMPTS)
    } else {
        password_prompts.to_vec()
    };
    let prompts: Vec<Vec<u8>> = if prompts.is_empty() {
        defaults::str_prompts(defaults::DEFAULT_PROMPTS)
    } else {
        prompts.to_vec()
    };

    let sink = CaptureSink::new();
    let (_r, _w) = conn.set_tee_output(sink.clone());

    let status = Arc::new(AtomicU8::new(STATUS_NONE));
    let username = username.to_vec();
    let password = password.to_vec();

    for _ in 0..10 {
        status.store(STATUS_NONE, Ordering::SeqCst);

        let username_matcher = {
            let status = status.clone();
            let username = username.clone();
            matcher(
                user_prompts.clone(),
                Box::new(move |conn: &mut ConnWrapper, _bs: &[u8], _idx: usize| {
                    conn.sendln(&username)?;
                    status.store(STATUS_SENT_USERNAME, Ordering::SeqCst);
                    Ok(false)
                }),
            )
        };
        let password_matcher = {
            let status = status.clone();
            let password = password.clone();
            matcher(
                password_prompts.clone(),
                Box::new(move |conn: &mut ConnWrapper, _bs: &[u8], _idx: usize| {
                    let pw = if defaults::is_empty_password(&password) {
                        Vec::new()
                    } else {
                        password.clone()
                    };
                    conn.send_password(&pw)?;
                    status.store(STATUS_SENT_PASSWORD, Ordering::SeqCst);
                    Ok(false)
                }),
            )
        };
        let prompt_matcher = {
            let status = status.clone();
            matcher(
                prompts.clone(),
                Box::new(move |_conn: &mut ConnWrapper, _bs: &[u8], _idx: usize| {
                    status.store(STATUS_AT_PROMPT, Ordering::SeqCst);
                    Ok(false)
                }),
            )
        };
        let error_matcher = {
            let status = status.clone();
            matcher(
                defaults::str_prompts(defaults::DEFAULT_ERROR_PROMPTS),
                Box::new(move |_conn: &mut ConnWrapper, _bs: &[u8], _idx: usize| {
                    status.store(STATUS_ERROR, Ordering::SeqCst);
                    Ok(false)
                }),
            )
        };
        let permission_matcher = {
            let status = status.clone();
            matcher(
                defaults::str_prompts(defaults::DEFAULT_PERMISSION_PROMPTS),
                Box::new(move |_conn: &mut ConnWrapper, _bs: &[u8], _idx: usize| {
                    status.store(STATUS_PERMISSION_DENIED, Ordering::SeqCst);
                    Ok(false)
                }),
            )
        };

        let mut all: Vec<&dyn Matcher> = vec![
            &username_matcher,
            &password_matcher,
            &prompt_matcher,
            &error_matcher,
            &permission_matcher,
        ];
        all.extend_from_slice(extra);

        if let Err(e) = expect(conn, &all) {
            return Err(ExpectError::Other(format!("user login fail: {e}")));
        }

        match status.load(Ordering::SeqCst) {
            STATUS_AT_PROMPT => {
                conn.drain_off(Duration::from_secs(1))
                    .map_err(|e| ExpectError::Other(format!("read prompt failed, drain off, {e}")))?;

                let received = sink.bytes();
                if received.is_empty() {
                    return Err(ExpectError::Other("read prompt failed, received is empty".into()));
                }

                let prompt = get_prompt(&received, &prompts).ok_or_else(|| {
                    ExpectError::Other(format!(
                        "read prompt failed: \r\n{}",
                        hexdump_if_needed(&received)
                    ))
                })?;
                info!(prompt = %String::from_utf8_lossy(&prompt), "login succeeded");
                return Ok(prompt);
            }
            STATUS_ERROR => {
                let received = sink.bytes();
                warn!("login rejected: invalid credentials");
                return Err(ExpectError::InvalidCredentials(if received.is_empty() {
                    "invalid password".into()
                } else {
                    format!("invalid password: \r\n{}", hexdump_if_needed(&received))
                }));
            }
            STATUS_PERMISSION_DENIED => {
                let received = sink.bytes();
                warn!("login rejected: permission denied");
                return Err(ExpectError::PermissionDenied(hexdump_if_needed(&received)));
            }
            _ => continue,
        }
    }

    Err(ExpectError::LoginExhausted(hexdump_if_needed(&sink.bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::Pipe;
    use crate::transport::test_support::RecordingTransport;
    use std::sync::Arc as StdArc;

    fn conn_with_bytes(bytes: &[u8]) -> (ConnWrapper, RecordingTransport) {
        let pipe = StdArc::new(Pipe::new(0));
        pipe.write(bytes).unwrap();
        let transport = RecordingTransport::default();
        (ConnWrapper::new(pipe, Box::new(transport.clone())), transport)
    }

    #[test]
    fn user_login_happy_path() {
        let (mut conn, transport) = conn_with_bytes(b"Username: Password: router#");
        let prompt = user_login(
            &mut conn,
            &[],
            b"admin",
            &[],
            b"hunter2",
            &[],
            &[],
        )
        .unwrap();
        assert_eq!(prompt, b"router#");
        assert_eq!(*transport.written.lock().unwrap(), b"admin\n");
        assert_eq!(*transport.passwords_sent.lock().unwrap(), vec![b"hunter2".to_vec()]);
    }

    #[test]
    fn user_login_reports_invalid_credentials() {
        let (mut conn, _t) = conn_with_bytes(b"Username: Password: Login invalid");
        let err = user_login(&mut conn, &[], b"admin", &[], b"bad", &[], &[]).unwrap_err();
        assert!(matches!(err, ExpectError::InvalidCredentials(_)));
    }

    #[test]
    fn user_login_sends_empty_string_for_empty_password_sentinel() {
        let (mut conn, transport) = conn_with_bytes(b"Username: Password: router#");
        user_login(&mut conn, &[], b"admin", &[], b"<<empty>>", &[], &[]).unwrap();
        assert_eq!(*transport.passwords_sent.lock().unwrap(), vec![Vec::<u8>::new()]);
    }
}
