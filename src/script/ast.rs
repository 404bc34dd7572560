//! The parsed form of a script: one [`Step`] per line (or per `{ ... }`
//! block, for `@trigger`).
//!
//! The original represents each parsed line as a closure captured into a
//! `Command.Run` field. Here it's a plain enum instead — idiomatic Rust
//! favors a data-driven AST that a single interpreter walks over a table of
//! per-verb closures assembled at parse time; it's also what makes replay
//! and introspection (`Script::steps`) possible without re-parsing.

use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Step {
    /// `@connect` — dialing the transport happens before a
    /// [`crate::session::Session`] exists at all, so this step's job is
    /// everything after that: drive login, read the resulting prompt, and
    /// enter enable mode, skipping whichever of those the script asked to
    /// skip. The `auto`/`ssh`/`telnet` tokens describe the transport choice
    /// made before the session existed and are validated by the parser but
    /// carry no data here.
    Connect {
        skip_login: bool,
        skip_prompt: bool,
        skip_enable: bool,
    },
    Login,
    Enable,
    /// `@write` — send raw bytes with no trailing newline.
    Write(Vec<u8>),
    /// `@send` — send bytes followed by a newline.
    Send(Vec<u8>),
    /// `@write <<password>>` / `@send <<password>>` sugar: submit the
    /// session's login password via the password-masking send path.
    WritePassword,
    WriteEnablePassword,
    /// `@echo` — wait for a literal string (not treated as a prompt).
    Echo(Vec<Vec<u8>>),
    Sleep(Duration),
    /// `@prompt` — read and record the current prompt.
    Prompt,
    /// `@exec` — send a command and capture its output.
    Exec(String),
    /// `@password` — submit a literal password string (or the
    /// `<<password>>`/`<<enable_password>>`/`<<empty>>` sentinels).
    Password(Vec<u8>),
    /// `@drain` — flush whatever is currently buffered, non-blocking.
    Drain,
    UseCrlf,
    ReadTimeout(Duration),
    /// `@@fail` — register a string that marks a later step's output as a
    /// failure if seen.
    Fail(String),
    /// `@trigger ... { ... }` — an extra matcher active for the rest of
    /// the script: if `prompts` is seen mid-command, run `sub_script` and
    /// (depending on `already_more`) either keep going or stop there.
    Trigger {
        prompts: Vec<Vec<u8>>,
        already_more: bool,
        sub_script: Script,
    },
}

#[derive(Debug, Clone)]
pub struct Line {
    pub line_number: usize,
    pub line_text: String,
    pub command: String,
    pub step: Step,
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub lines: Vec<Line>,
}
