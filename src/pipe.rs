//! A bounded byte queue bridging a background transport-reader thread and
//! the synchronous expect loop.
//!
//! Ported from the original's channel-based pipe, but backed by a
//! `Mutex<VecDeque<u8>>` + `Condvar` instead of an `mpsc`-style channel:
//! [`Pipe::drain_to`] needs to observe how many bytes are *currently*
//! buffered without consuming them, which a channel receiver cannot do.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::errors::PipeError;

/// Default capacity in bytes, matching the original's buffered channel size.
pub const DEFAULT_PIPE_BUFFER_SIZE: usize = 8 * 1024;

struct Inner {
    queue: VecDeque<u8>,
    capacity: usize,
    closed: bool,
    sticky_err: Option<PipeError>,
    read_timeout: Duration,
    write_timeout: Duration,
}

/// A bounded, closable byte pipe with independent read/write deadlines.
pub struct Pipe {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl Pipe {
    /// Create a pipe with the given capacity; `0` uses
    /// [`DEFAULT_PIPE_BUFFER_SIZE`].
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_PIPE_BUFFER_SIZE
        } else {
            capacity
        };
        Pipe {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity.min(4096)),
                capacity,
                closed: false,
                sticky_err: None,
                read_timeout: Duration::ZERO,
                write_timeout: Duration::ZERO,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// `t == Duration::ZERO` means block indefinitely.
    pub fn set_read_deadline(&self, t: Duration) {
        self.inner.lock().unwrap().read_timeout = t;
    }

    /// `t == Duration::ZERO` means block indefinitely.
    pub fn set_write_deadline(&self, t: Duration) {
        self.inner.lock().unwrap().write_timeout = t;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// Close the pipe. Already-buffered bytes remain readable afterward.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Close the pipe, recording `err` as the sticky error returned by
    /// reads once the buffer drains.
    pub fn close_with_error(&self, err: PipeError) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.sticky_err.is_none() {
                inner.sticky_err = Some(err);
            }
        }
        self.close();
    }

    fn closed_error(inner: &Inner) -> PipeError {
        inner.sticky_err.clone().unwrap_or(PipeError::Closed)
    }

    pub fn write_byte(&self, b: u8) -> Result<(), PipeError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(Self::closed_error(&inner));
        }
        loop {
            if inner.queue.len() < inner.capacity {
                inner.queue.push_back(b);
                self.not_empty.notify_one();
                return Ok(());
            }
            let timeout = inner.write_timeout;
            if timeout.is_zero() {
                inner = self.not_full.wait(inner).unwrap();
            } else {
                let (g, res) = self.not_full.wait_timeout(inner, timeout).unwrap();
                inner = g;
                if res.timed_out() && inner.queue.len() >= inner.capacity {
                    return Err(PipeError::Timeout);
                }
            }
            if inner.closed {
                return Err(Self::closed_error(&inner));
            }
        }
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize, PipeError> {
        for (n, &b) in buf.iter().enumerate() {
            if let Err(e) = self.write_byte(b) {
                return if n > 0 { Ok(n) } else { Err(e) };
            }
        }
        Ok(buf.len())
    }

    /// Read one byte, honoring the read deadline set via
    /// [`Pipe::set_read_deadline`] (zero duration blocks indefinitely).
    pub fn read_byte(&self) -> Result<u8, PipeError> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(b) = inner.queue.pop_front() {
                self.not_full.notify_one();
                return Ok(b);
            }
            if inner.closed {
                return Err(Self::closed_error(&inner));
            }
            let timeout = inner.read_timeout;
            if timeout.is_zero() {
                inner = self.not_empty.wait(inner).unwrap();
            } else {
                let (g, res) = self.not_empty.wait_timeout(inner, timeout).unwrap();
                inner = g;
                if res.timed_out() && inner.queue.is_empty() {
                    return Err(PipeError::Timeout);
                }
            }
        }
    }

    /// Fill `buf` with whatever is available.
    ///
    /// With no read deadline set, returns immediately with however many
    /// bytes were already queued (possibly zero). With a deadline set,
    /// blocks up to that long per byte, same as [`Pipe::read_byte`].
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, PipeError> {
        let mut offset = 0;
        let read_timeout = self.inner.lock().unwrap().read_timeout;
        while offset < buf.len() {
            if read_timeout.is_zero() {
                let mut inner = self.inner.lock().unwrap();
                match inner.queue.pop_front() {
                    Some(b) => {
                        drop(inner);
                        self.not_full.notify_one();
                        buf[offset] = b;
                        offset += 1;
                    }
                    None => {
                        if inner.closed && offset == 0 {
                            return Err(Self::closed_error(&inner));
                        }
                        return Ok(offset);
                    }
                }
            } else {
                match self.read_byte() {
                    Ok(b) => {
                        buf[offset] = b;
                        offset += 1;
                    }
                    Err(PipeError::Timeout) => return Ok(offset),
                    Err(e) => {
                        if offset == 0 {
                            return Err(e);
                        }
                        return Ok(offset);
                    }
                }
            }
        }
        Ok(offset)
    }

    /// Drain everything currently buffered into `out`, then wait up to
    /// `timeout` for more; each time a byte arrives the wait resets, so a
    /// steady trickle of bytes keeps the drain going past a single
    /// `timeout` window, while an idle gap longer than `timeout` ends it.
    pub fn drain_to(&self, timeout: Duration, out: &mut Vec<u8>) -> Result<usize, PipeError> {
        let mut count = 0;
        loop {
            let mut inner = self.inner.lock().unwrap();
            if let Some(b) = inner.queue.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                out.push(b);
                count += 1;
                continue;
            }
            if inner.closed {
                return if count > 0 {
                    Ok(count)
                } else {
                    Err(Self::closed_error(&inner))
                };
            }
            if timeout.is_zero() {
                return Ok(count);
            }
            let deadline = Instant::now() + timeout;
            let (g, res) = self.not_empty.wait_timeout(inner, timeout).unwrap();
            inner = g;
            if res.timed_out() && inner.queue.is_empty() && Instant::now() >= deadline {
                return Ok(count);
            }
        }
    }
}
