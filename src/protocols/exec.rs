//! Running a single command to completion and capturing its output.

use crate::conn::{CaptureSink, ConnWrapper};
use crate::errors::ExpectError;
use crate::expect::{defaults, expect, matcher};

/// Send `cmd`, wait for `prompt` to reappear, and return everything echoed
/// back before it (i.e. the command's output, sans the trailing prompt).
///
/// A literal `\n` prefix on `prompt` (as opposed to an actual newline byte)
/// is collapsed to one, matching callers that pass a prompt string through
/// a layer that escaped its leading newline.
pub fn exec(conn: &mut ConnWrapper, prompt: &[u8], cmd: &[u8]) -> Result<Vec<u8>, ExpectError> {
    if prompt.is_empty() {
        return Err(ExpectError::Other("prompt is missing".into()));
    }
    if cmd.is_empty() {
        return Err(ExpectError::Other("cmd is missing".into()));
    }

    let mut prompt = prompt.to_vec();
    if prompt.starts_with(b"\\n") {
        prompt[1] = b'\n';
        prompt.remove(0);
    }

    let sink = CaptureSink::new();
    let _guard = conn.set_tee_reader(sink.clone());

    conn.sendln(cmd)?;

    let m = matcher(
        vec![prompt.clone()],
        Box::new(|_conn: &mut ConnWrapper, _bs: &[u8], _idx: usize| Ok(false)),
    );
    expect(conn, &[&m])?;

    let bs = sink.bytes();
    let bs = &bs[..bs.len().saturating_sub(prompt.len())];

    for permission_prompt in defaults::DEFAULT_PERMISSION_PROMPTS {
        if contains(bs, permission_prompt.as_bytes()) {
            return Err(ExpectError::PermissionDenied((*permission_prompt).to_string()));
        }
    }

    Ok(bs.to_vec())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
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
    fn exec_returns_output_without_trailing_prompt() {
        let (mut conn, transport) = conn_with_bytes(b"show version\r\nVersion 1.0\r\nswitch#");
        let out = exec(&mut conn, b"switch#", b"show version").unwrap();
        assert_eq!(out, b"show version\r\nVersion 1.0\r\n");
        assert_eq!(*transport.written.lock().unwrap(), b"show version\n");
    }

    #[test]
    fn exec_detects_permission_denial() {
        let (mut conn, _t) = conn_with_bytes(b"Command authorization failed.\r\nswitch#");
        let err = exec(&mut conn, b"switch#", b"reload").unwrap_err();
        assert!(matches!(err, ExpectError::PermissionDenied(_)));
    }

    #[test]
    fn exec_rejects_missing_prompt_or_cmd() {
        let (mut conn, _t) = conn_with_bytes(b"switch#");
        assert!(exec(&mut conn, b"", b"show version").is_err());
        assert!(exec(&mut conn, b"switch#", b"").is_err());
    }
}
