//! `ConnWrapper`: the framed duplex handle that sits between the raw
//! [`crate::pipe::Pipe`]/[`crate::transport::Transport`] pair and the
//! `Expect`-driven protocol layer above it.
//!
//! Owns the cross-boundary pattern matcher (`read_until`), the banner
//! suppression heuristics (`skip_hits`), and the tee-capture stack used to
//! record what a script step sent/received.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::errors::ExpectError;
use crate::pipe::Pipe;
use crate::transport::Transport;

/// A tee frame: any sink that wants a copy of bytes flowing through the
/// connection. Implemented for [`CaptureSink`] and anything else that is
/// `Write + Send`.
type TeeFrame = Box<dyn Write + Send>;

/// An independent stack of tee frames.
///
/// Unlike the original's single atomic slot with manual fan-out (where
/// canceling an outer tee had to know about every tee pushed after it),
/// this keeps every active frame in its own slot. Canceling one frame
/// (via dropping its [`TeeGuard`]) never disturbs any other, regardless of
/// push/cancel order — the stack-discipline invariant holds mechanically
/// instead of by convention.
#[derive(Clone, Default)]
struct TeeStack {
    frames: Arc<Mutex<Vec<(u64, TeeFrame)>>>,
    next_id: Arc<AtomicU64>,
}

impl TeeStack {
    fn push(&self, sink: TeeFrame) -> TeeGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.frames.lock().unwrap().push((id, sink));
        TeeGuard {
            stack: self.clone(),
            id,
        }
    }

    fn write_all(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut frames = self.frames.lock().unwrap();
        for (_, sink) in frames.iter_mut() {
            let _ = sink.write_all(data);
        }
    }

    fn cancel(&self, id: u64) {
        self.frames.lock().unwrap().retain(|(fid, _)| *fid != id);
    }
}

/// Cancels its tee frame when dropped. Holding this is how callers scope a
/// tee to "for the duration of this step".
#[must_use = "dropping this immediately cancels the tee"]
pub struct TeeGuard {
    stack: TeeStack,
    id: u64,
}

impl Drop for TeeGuard {
    fn drop(&mut self) {
        self.stack.cancel(self.id);
    }
}

/// A `Write` sink backed by a shared byte buffer, for capturing tee'd
/// output into memory (what script step results and `UserLogin`'s internal
/// buffering use).
#[derive(Clone, Default)]
pub struct CaptureSink(Arc<Mutex<Vec<u8>>>);

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl Write for CaptureSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// The framed duplex handle: reads come off a shared [`Pipe`] (fed by a
/// background reader thread the caller owns), writes go straight to the
/// injected [`Transport`].
pub struct ConnWrapper {
    pipe: Arc<Pipe>,
    writer: Box<dyn Transport>,
    use_crlf: bool,
    tee_reader: TeeStack,
    tee_writer: TeeStack,
}

impl ConnWrapper {
    pub fn new(pipe: Arc<Pipe>, writer: Box<dyn Transport>) -> Self {
        ConnWrapper {
            pipe,
            writer,
            use_crlf: false,
            tee_reader: TeeStack::default(),
            tee_writer: TeeStack::default(),
        }
    }

    pub fn use_crlf(&mut self) {
        self.use_crlf = true;
    }

    pub fn set_read_deadline(&self, t: Duration) {
        self.pipe.set_read_deadline(t);
    }

    pub fn set_write_deadline(&self, t: Duration) {
        self.pipe.set_write_deadline(t);
    }

    /// Tee a copy of every byte *read* from the connection to `sink`.
    pub fn set_tee_reader(&mut self, sink: impl Write + Send + 'static) -> TeeGuard {
        self.tee_reader.push(Box::new(sink))
    }

    /// Tee a copy of every byte *written* to the connection to `sink`.
    pub fn set_tee_writer(&mut self, sink: impl Write + Send + 'static) -> TeeGuard {
        self.tee_writer.push(Box::new(sink))
    }

    /// Tee both directions to the same sink.
    pub fn set_tee_output(&mut self, sink: CaptureSink) -> (TeeGuard, TeeGuard) {
        (
            self.set_tee_reader(sink.clone()),
            self.set_tee_writer(sink),
        )
    }

    pub fn read_byte(&self) -> Result<u8, ExpectError> {
        let b = self.pipe.read_byte()?;
        self.tee_reader.write_all(&[b]);
        Ok(b)
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), ExpectError> {
        self.writer.write_all(data)?;
        self.tee_writer.write_all(data);
        Ok(())
    }

    pub fn send(&mut self, data: &[u8]) -> Result<(), ExpectError> {
        self.write(data)
    }

    pub fn sendln(&mut self, data: &[u8]) -> Result<(), ExpectError> {
        if !data.is_empty() {
            self.write(data)?;
        }
        if data.ends_with(b"\n") {
            return Ok(());
        }
        let nl: &[u8] = if self.use_crlf { b"\r\n" } else { b"\n" };
        self.write(nl)
    }

    pub fn send_password(&mut self, password: &[u8]) -> Result<(), ExpectError> {
        self.writer.send_password(password)?;
        self.tee_writer.write_all(b"********");
        let nl: &[u8] = if self.use_crlf { b"\r\n" } else { b"\n" };
        self.write(nl)
    }

    /// Drain whatever is currently buffered (plus a trickle of more, up to
    /// `timeout`), teeing it through the read side like any other read.
    pub fn drain_off(&self, timeout: Duration) -> Result<usize, ExpectError> {
        let mut buf = Vec::new();
        let n = self.pipe.drain_to(timeout, &mut buf)?;
        self.tee_reader.write_all(&buf);
        Ok(n)
    }

    /// Read bytes until one of `delims` matches a trailing run of the
    /// accumulated buffer, returning which delimiter matched. Matches the
    /// original's cross-boundary pattern matcher: a delimiter that straddles
    /// two `read_byte()` calls is still detected, via `longest_prefix_overlap`
    /// recomputing how much of the pattern the *already consumed* tail still
    /// satisfies whenever a byte breaks the current match.
    pub fn read_until(&self, buf: &mut Vec<u8>, delims: &[&[u8]]) -> Result<usize, ExpectError> {
        if delims.is_empty() {
            return Ok(0);
        }
        for (i, d) in delims.iter().enumerate() {
            if d.is_empty() {
                return Ok(i);
            }
        }

        let mut remaining: Vec<&[u8]> = delims.to_vec();

        loop {
            let b = match self.read_byte() {
                Ok(b) => b,
                Err(e) => {
                    if e.is_timeout() {
                        let trimmed = trim_ascii_whitespace(buf);
                        if trimmed.ends_with(b"#") {
                            if let Some(i) = delims.iter().position(|d| *d == b"#") {
                                return Ok(i);
                            }
                        }
                    }
                    return Err(e);
                }
            };
            buf.push(b);

            for i in 0..remaining.len() {
                if remaining[i].first() != Some(&b) {
                    let already_recv_size = delims[i].len() - remaining[i].len();
                    let already_recv = &delims[i][..already_recv_size];
                    let n = longest_prefix_overlap(already_recv, b, delims[i]);
                    remaining[i] = &delims[i][n..];
                } else {
                    remaining[i] = &remaining[i][1..];
                }

                if remaining[i].is_empty() {
                    if skip_hits(buf, delims[i]) {
                        remaining[i] = delims[i];
                        continue;
                    }
                    return Ok(i);
                }
            }
        }
    }
}

/// Single-pattern KMP failure step: how much of `pattern`'s prefix does
/// `s` followed by `b` still satisfy as a suffix? Ported from the
/// original's `crossingMatch2`, which is a restricted form of
/// `crossingMatch(append(s, b), pattern)` that avoids the allocation.
fn longest_prefix_overlap(s: &[u8], b: u8, pattern: &[u8]) -> usize {
    if pattern.is_empty() {
        return 0;
    }
    let mut l = s.len().min(pattern.len() - 1);
    while l > 0 {
        if pattern[l] == b && s[s.len() - l..] == pattern[..l] {
            return l + 1;
        }
        l -= 1;
    }
    0
}

fn trim_ascii_whitespace(bs: &[u8]) -> &[u8] {
    let start = bs.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bs.len());
    let end = bs.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &bs[start..end]
}

fn trim_nul_and_whitespace(bs: &[u8]) -> &[u8] {
    let pred = |b: &u8| *b != 0 && !b.is_ascii_whitespace();
    let start = bs.iter().position(pred).unwrap_or(bs.len());
    let end = bs.iter().rposition(pred).map_or(start, |i| i + 1);
    &bs[start..end]
}

/// Banner-suppression heuristics: even though the tail of the buffer
/// matches a delimiter, some contexts mean it isn't really the prompt yet
/// (a `Last login:` banner, a password placeholder echoed back, etc). The
/// original calls this "pragmatic, not principled" — implemented here as
/// an ordered table of rules rather than one long `if`/`else if` chain, so
/// each heuristic can be read (and tested) in isolation.
fn skip_hits(bs: &[u8], delim: &[u8]) -> bool {
    type Rule = fn(&[u8], &[u8]) -> Option<bool>;
    const RULES: &[Rule] = &[
        suffix_is_last_login_banner,
        suffix_is_close_tag,
        suffix_is_credential_placeholder,
        last_line_rules,
    ];
    for rule in RULES {
        if let Some(v) = rule(bs, delim) {
            return v;
        }
    }
    false
}

fn suffix_is_last_login_banner(bs: &[u8], _delim: &[u8]) -> Option<bool> {
    (bs.ends_with(b"Last login:") || bs.ends_with(b"last login:")).then_some(true)
}

fn suffix_is_close_tag(bs: &[u8], _delim: &[u8]) -> Option<bool> {
    bs.ends_with(b"</>").then_some(true)
}

fn suffix_is_credential_placeholder(bs: &[u8], _delim: &[u8]) -> Option<bool> {
    (bs.ends_with(b"<myuser>") || bs.ends_with(b"<mypassword>")).then_some(true)
}

/// Two related checks on the last line of the buffer: a `#`-prefixed line
/// (error banners that happen to end with a prompt character) is always
/// suppressed, and a bare `$` delimiter is suppressed unless the line looks
/// like a bracketed shell prompt (`[user@host]$`).
fn last_line_rules(bs: &[u8], delim: &[u8]) -> Option<bool> {
    let last_lf = bs.iter().rposition(|&b| b == b'\n')?;
    let last_line = trim_nul_and_whitespace(&bs[last_lf + 1..]);
    if last_line.is_empty() {
        return None;
    }

    if last_line.starts_with(b"#") {
        return Some(true);
    }

    if delim == b"$" && last_line != b"$" {
        if last_line.first() == Some(&b'[') {
            let without_dollar = last_line.strip_suffix(b"$").unwrap_or(last_line);
            let trimmed = trim_nul_and_whitespace(without_dollar);
            if trimmed.last() == Some(&b']') {
                return Some(false);
            }
        }
        return Some(true);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_support::RecordingTransport;
    use std::time::Duration as Dur;

    fn conn_with_bytes(bytes: &[u8]) -> (ConnWrapper, Arc<Pipe>) {
        let pipe = Arc::new(Pipe::new(0));
        pipe.write(bytes).unwrap();
        let conn = ConnWrapper::new(Arc::clone(&pipe), Box::new(RecordingTransport::default()));
        (conn, pipe)
    }

    #[test]
    fn read_until_finds_simple_delimiter() {
        let (conn, _pipe) = conn_with_bytes(b"hello#");
        let mut buf = Vec::new();
        let idx = conn.read_until(&mut buf, &[b"#"]).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(buf, b"hello#");
    }

    #[test]
    fn read_until_picks_shortest_matching_index() {
        let (conn, _pipe) = conn_with_bytes(b"prompt>");
        let mut buf = Vec::new();
        let idx = conn.read_until(&mut buf, &[b"#", b">"]).unwrap();
        assert_eq!(idx, 1);
    }

    #[test]
    fn read_until_handles_cross_boundary_overlap() {
        // delimiter "##" must not falsely trigger on "a#b#" partial overlap,
        // but must trigger once the full pattern appears split across reads.
        let (conn, _pipe) = conn_with_bytes(b"a#b##");
        let mut buf = Vec::new();
        let idx = conn.read_until(&mut buf, &[b"##"]).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(buf, b"a#b##");
    }

    #[test]
    fn read_until_empty_delim_matches_immediately() {
        let (conn, _pipe) = conn_with_bytes(b"");
        let mut buf = Vec::new();
        let idx = conn.read_until(&mut buf, &[b"", b"#"]).unwrap();
        assert_eq!(idx, 0);
    }

    #[test]
    fn skip_hits_suppresses_last_login_banner() {
        assert!(skip_hits(b"Welcome\r\nLast login:", b":"));
    }

    #[test]
    fn skip_hits_suppresses_hash_prefixed_error_line() {
        assert!(skip_hits(b"login failed\n### Login failed", b"d"));
    }

    #[test]
    fn skip_hits_accepts_bracketed_dollar_prompt() {
        assert!(!skip_hits(b"welcome\n[mfk]$", b"$"));
    }

    #[test]
    fn skip_hits_rejects_bare_dollar_echo() {
        assert!(skip_hits(b"typed\nAAA$AAA", b"$"));
    }

    #[test]
    fn tee_reader_captures_bytes_and_cancels_on_drop() {
        let (mut conn, pipe) = conn_with_bytes(b"ab");
        let sink = CaptureSink::new();
        {
            let _guard = conn.set_tee_reader(sink.clone());
            conn.read_byte().unwrap();
        }
        pipe.write(b"c").unwrap();
        conn.read_byte().unwrap();
        assert_eq!(sink.bytes(), b"a");
    }

    #[test]
    fn nested_tee_cancel_does_not_disturb_sibling() {
        let (mut conn, _pipe) = conn_with_bytes(b"xy");
        let outer = CaptureSink::new();
        let inner = CaptureSink::new();
        let outer_guard = conn.set_tee_reader(outer.clone());
        {
            let _inner_guard = conn.set_tee_reader(inner.clone());
            conn.read_byte().unwrap();
        }
        conn.read_byte().unwrap();
        drop(outer_guard);
        assert_eq!(outer.bytes(), b"xy");
        assert_eq!(inner.bytes(), b"x");
    }

    #[test]
    fn sendln_appends_newline_once() {
        let pipe = Arc::new(Pipe::new(0));
        let transport = RecordingTransport::default();
        let mut conn = ConnWrapper::new(pipe, Box::new(transport.clone()));
        conn.sendln(b"show version").unwrap();
        assert_eq!(*transport.written.lock().unwrap(), b"show version\n");
    }

    #[test]
    fn sendln_skips_newline_when_already_present() {
        let pipe = Arc::new(Pipe::new(0));
        let transport = RecordingTransport::default();
        let mut conn = ConnWrapper::new(pipe, Box::new(transport.clone()));
        conn.sendln(b"show version\n").unwrap();
        assert_eq!(*transport.written.lock().unwrap(), b"show version\n");
    }

    #[test]
    fn send_password_masks_tee_but_not_wire() {
        let pipe = Arc::new(Pipe::new(0));
        let transport = RecordingTransport::default();
        let mut conn = ConnWrapper::new(pipe, Box::new(transport.clone()));
        let sink = CaptureSink::new();
        let _g = conn.set_tee_writer(sink.clone());
        conn.send_password(b"hunter2").unwrap();
        assert_eq!(*transport.passwords_sent.lock().unwrap(), vec![b"hunter2".to_vec()]);
        assert_eq!(sink.bytes(), b"********\n");
    }

    #[test]
    fn drain_off_returns_buffered_bytes() {
        let (conn, _pipe) = conn_with_bytes(b"leftover");
        let n = conn.drain_off(Dur::ZERO).unwrap();
        assert_eq!(n, 8);
    }
}
