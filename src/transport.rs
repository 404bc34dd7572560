//! The injection seam between this crate and whatever dials the actual
//! telnet/SSH/serial connection.
//!
//! This crate never opens a socket itself — a consumer owns the real
//! connection, spawns a background thread that copies bytes read from it
//! into a [`crate::pipe::Pipe`], and hands this crate a [`Transport`] for
//! the write half. That mirrors the teacher's capability-injection pattern
//! (`session/traits.rs`'s `OutputSink`/`ProcessSpawner`): the core defines
//! *what* to send, the consumer supplies *how*.

use std::io;

/// The write half of a device connection.
///
/// `send_password` has a default that just calls [`Transport::write_all`] —
/// override it when the underlying transport has a dedicated
/// password-submission API that avoids echoing the secret back (some SSH
/// libraries expose this for keyboard-interactive auth).
pub trait Transport: Send {
    /// Write `data` to the device, returning once fully sent.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Submit a password. Default implementation is a plain write.
    fn send_password(&mut self, password: &[u8]) -> io::Result<()> {
        self.write_all(password)
    }

    /// Close the underlying connection.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for Box<dyn Transport> {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write_all(data)
    }

    fn send_password(&mut self, password: &[u8]) -> io::Result<()> {
        (**self).send_password(password)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Transport;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// An in-memory transport that records every write, for assertions in
    /// protocol-level tests.
    #[derive(Clone, Default)]
    pub struct RecordingTransport {
        pub written: Arc<Mutex<Vec<u8>>>,
        pub passwords_sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Transport for RecordingTransport {
        fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            self.written.lock().unwrap().extend_from_slice(data);
            Ok(())
        }

        fn send_password(&mut self, password: &[u8]) -> io::Result<()> {
            self.passwords_sent.lock().unwrap().push(password.to_vec());
            Ok(())
        }
    }
}
