//! `Session`: the stateful handle scripts and callers drive — wraps a
//! [`ConnWrapper`] with the current prompt, the view stack `WithView`/
//! `ExitView` push and pop, fail-string detection, and a bag of ad hoc
//! variables a script can read and write.
//!
//! Dialing the underlying transport is out of scope here: a caller builds
//! the [`ConnWrapper`] (wiring a background reader thread into a
//! [`crate::pipe::Pipe`] and supplying a [`crate::transport::Transport`]
//! for the write side) and hands it to [`Session::new`] once already
//! connected.

use std::collections::HashMap;
use std::time::Duration;

use crate::conn::{CaptureSink, ConnWrapper};
use crate::errors::ExpectError;
use crate::expect::{defaults, Matcher};
use crate::protocols;

/// A device dialogue in progress: one connection, its current prompt, the
/// stack of prompts visited via `WithView`, and script-level bookkeeping.
pub struct Session {
    conn: Option<ConnWrapper>,
    prompt: Vec<u8>,
    prompt_stack: Vec<Vec<u8>>,
    fail_strings: Vec<Vec<u8>>,
    variables: HashMap<String, String>,
    questions: Vec<Box<dyn Matcher>>,
    use_crlf: bool,
}

impl Session {
    pub fn new(conn: ConnWrapper) -> Self {
        Session {
            conn: Some(conn),
            prompt: Vec::new(),
            prompt_stack: Vec::new(),
            fail_strings: Vec::new(),
            variables: HashMap::new(),
            questions: Vec::new(),
            use_crlf: false,
        }
    }

    pub fn use_crlf(&mut self, on: bool) {
        self.use_crlf = on;
        if let Some(conn) = self.conn.as_mut() {
            if on {
                conn.use_crlf();
            }
        }
    }

    pub fn prompt(&self) -> &[u8] {
        &self.prompt
    }

    pub fn set_prompt(&mut self, prompt: Vec<u8>) {
        self.prompt = prompt;
    }

    fn push_prompt(&mut self) {
        self.prompt_stack.push(self.prompt.clone());
    }

    fn pop_prompt(&mut self) -> Result<(), ExpectError> {
        match self.prompt_stack.pop() {
            Some(p) => {
                self.prompt = p;
                Ok(())
            }
            None => Err(ExpectError::Other("current is not view mode".into())),
        }
    }

    /// Register a string that, if seen in any future command's captured
    /// output, should be treated as a failure by a script runner.
    pub fn add_fail_string(&mut self, msg: &str) {
        if !msg.is_empty() {
            self.fail_strings.push(msg.as_bytes().to_vec());
        }
    }

    pub fn fail_strings(&self) -> &[Vec<u8>] {
        &self.fail_strings
    }

    /// Register an extra matcher consulted alongside the built-ins on every
    /// subsequent `login`/`enable`/`with_view` call (e.g. a host-key
    /// acceptance prompt specific to one device family).
    pub fn add_question(&mut self, question: Box<dyn Matcher>) {
        self.questions.push(question);
    }

    fn question_refs(&self) -> Vec<&dyn Matcher> {
        self.questions.iter().map(|q| q.as_ref()).collect()
    }

    fn conn_mut(&mut self) -> Result<&mut ConnWrapper, ExpectError> {
        self.conn.as_mut().ok_or_else(|| ExpectError::Other("no connection".into()))
    }

    /// `<<none>>` username paired with `<<none>>`/`<<anonymous>>` password
    /// means the device needs neither: skip straight to reading whatever
    /// prompt is already sitting there instead of waiting on a username
    /// prompt that will never come.
    pub fn login(
        &mut self,
        user_prompts: &[Vec<u8>],
        username: &[u8],
        password_prompts: &[Vec<u8>],
        password: &[u8],
        prompts: &[Vec<u8>],
    ) -> Result<(), ExpectError> {
        if defaults::is_none_username(username) && defaults::is_none_password(password) {
            return self.read_prompt(prompts);
        }

        let questions = self.question_refs();
        let conn = self.conn_mut()?;
        let prompt = protocols::user_login(conn, user_prompts, username, password_prompts, password, prompts, &questions)?;
        self.set_prompt(prompt);
        Ok(())
    }

    pub fn enable(
        &mut self,
        enable_cmd: &[u8],
        password_prompts: &[Vec<u8>],
        password: &[u8],
        enable_prompts: &[Vec<u8>],
    ) -> Result<(), ExpectError> {
        let conn = self.conn_mut()?;
        let prompt = protocols::with_enable(conn, enable_cmd, password_prompts, password, enable_prompts)?;
        self.set_prompt(prompt);
        Ok(())
    }

    pub fn read_prompt(&mut self, expected: &[Vec<u8>]) -> Result<(), ExpectError> {
        let questions = self.question_refs();
        let conn = self.conn_mut()?;
        let prompt = protocols::read_prompt(conn, expected, &questions)?;
        self.set_prompt(prompt);
        Ok(())
    }

    pub fn with_view(&mut self, cmd: &[u8], new_prompts: &[Vec<u8>]) -> Result<(), ExpectError> {
        let conn = self.conn_mut()?;
        let new_prompt = protocols::with_view(conn, cmd, new_prompts)?;
        self.push_prompt();
        self.set_prompt(new_prompt);
        Ok(())
    }

    /// Leave the current view: pop back to the prompt seen before the
    /// matching `with_view`, then run `cmd` (typically `exit` or `quit`) to
    /// actually bring the device back to it.
    pub fn exit_view(&mut self, cmd: &[u8]) -> Result<Vec<u8>, ExpectError> {
        self.pop_prompt()?;
        self.exec(cmd)
    }

    pub fn write(&mut self, bs: &[u8]) -> Result<(), ExpectError> {
        self.conn_mut()?.write(bs)
    }

    pub fn sendln(&mut self, bs: &[u8]) -> Result<(), ExpectError> {
        self.conn_mut()?.sendln(bs)
    }

    pub fn send_password(&mut self, password: &[u8]) -> Result<(), ExpectError> {
        self.conn_mut()?.send_password(password)
    }

    pub fn drain_off(&mut self, timeout: Duration) -> Result<usize, ExpectError> {
        self.conn_mut()?.drain_off(timeout)
    }

    pub fn set_read_deadline(&mut self, timeout: Duration) -> Result<(), ExpectError> {
        self.conn_mut()?.set_read_deadline(timeout);
        Ok(())
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    pub fn has_connection(&self) -> bool {
        self.conn.is_some()
    }

    /// Wait until one of `prompts` is echoed back verbatim (the `@echo`
    /// verb's synchronization step — not a prompt match, just a literal
    /// string to wait for).
    pub fn echo(&mut self, prompts: Vec<Vec<u8>>) -> Result<(), ExpectError> {
        let conn = self.conn_mut()?;
        let m = crate::expect::matcher(prompts, crate::expect::defaults::return_ok());
        crate::expect::expect(conn, &[&m as &dyn Matcher])
    }

    /// Run `body`, capturing the bytes that flow in each direction over the
    /// connection while it runs — what a script step's result record is
    /// built from. Capture is skipped (empty buffers) with no connection.
    pub fn with_tee<F, T>(&mut self, body: F) -> (T, Vec<u8>, Vec<u8>)
    where
        F: FnOnce(&mut Self) -> T,
    {
        let guards = self.conn.as_mut().map(|conn| {
            let in_sink = CaptureSink::new();
            let out_sink = CaptureSink::new();
            let in_guard = conn.set_tee_reader(in_sink.clone());
            let out_guard = conn.set_tee_writer(out_sink.clone());
            (in_guard, out_guard, in_sink, out_sink)
        });

        let result = body(self);

        match guards {
            Some((in_guard, out_guard, in_sink, out_sink)) => {
                drop(in_guard);
                drop(out_guard);
                (result, in_sink.take(), out_sink.take())
            }
            None => (result, Vec::new(), Vec::new()),
        }
    }

    /// Send `cmd` against the current prompt and return its output.
    pub fn exec(&mut self, cmd: &[u8]) -> Result<Vec<u8>, ExpectError> {
        let prompt = self.prompt.clone();
        let conn = self.conn_mut()?;
        // Clear out anything buffered from a prior step before sending —
        // on a genuinely dead connection this surfaces as an error here
        // rather than confusing the next command's output.
        conn.drain_off(Duration::ZERO)?;
        protocols::exec(conn, &prompt, cmd)
    }
}
