//! A tiny in-memory duplex "simulator" standing in for a real telnet/SSH/
//! serial transport: a background thread plays a scripted device, reading
//! whatever the client writes and feeding canned responses into the
//! client's `Pipe` once it sees the byte sequence it's waiting for.
//!
//! Grounded in the teacher's own pattern for bridging an async transport to
//! this crate's synchronous `Pipe` (a background thread owns the transport,
//! the synchronous side owns the pipe) and in `spec.md` §9's description of
//! the background read pump.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Condvar, Mutex, Once};
use std::thread;
use std::time::Duration;

use expecthub::pipe::Pipe;
use expecthub::transport::Transport;

static TRACING_INIT: Once = Once::new();

/// Install a test-writer `tracing` subscriber once per test binary, so the
/// `info!`/`warn!`/`debug!` spans emitted by login/enable/view are visible
/// with `--nocapture` instead of silently dropped for lack of a subscriber.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[derive(Clone, Default)]
struct SentBuffer(Arc<(Mutex<Vec<u8>>, Condvar)>);

impl SentBuffer {
    fn push(&self, data: &[u8]) {
        let (lock, cvar) = &*self.0;
        let mut buf = lock.lock().unwrap();
        buf.extend_from_slice(data);
        cvar.notify_all();
    }

    /// Block until the accumulated bytes contain `needle`, then drop
    /// everything up to and including it.
    fn wait_for(&self, needle: &[u8], timeout: Duration) -> bool {
        let (lock, cvar) = &*self.0;
        let mut buf = lock.lock().unwrap();
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(pos) = find(&buf, needle) {
                buf.drain(..pos + needle.len());
                return true;
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = cvar.wait_timeout(buf, deadline - now).unwrap();
            buf = guard;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub struct SimTransport {
    sent: SentBuffer,
}

impl Transport for SimTransport {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.sent.push(data);
        Ok(())
    }
}

/// One turn of the scripted device: wait for `expect` to appear in what the
/// client has sent so far, then write `respond` into the client's pipe.
pub struct Turn {
    pub expect: &'static [u8],
    pub respond: &'static [u8],
}

pub fn turn(expect: &'static [u8], respond: &'static [u8]) -> Turn {
    Turn { expect, respond }
}

/// Build a connected (pipe, transport) pair and spawn the background
/// thread that plays `script` against it.
pub fn simulate(script: Vec<Turn>) -> (Arc<Pipe>, SimTransport) {
    init_tracing();

    let pipe = Arc::new(Pipe::new(0));
    let sent = SentBuffer::default();
    let transport = SimTransport { sent: sent.clone() };

    let device_pipe = pipe.clone();
    thread::spawn(move || {
        for t in script {
            if !sent.wait_for(t.expect, Duration::from_secs(5)) {
                return;
            }
            if !t.respond.is_empty() {
                let _ = device_pipe.write(t.respond);
            }
        }
    });

    (pipe, transport)
}
