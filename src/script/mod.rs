//! A small DSL for driving a device dialogue: parse a text script into a
//! sequence of verbs (`@login`, `@exec show version`, ...), then run it
//! against a [`crate::session::Session`].
//!
//! Grounded in the original's `harness` package (`split.go`, `cmd.go`,
//! `script.go`): `lexer` is the word-splitter, `parser` turns lines into an
//! AST (`ast`), and `interp` walks that AST over a `Session`. `charset` and
//! `placeholders` are the two pluggable seams a script's literals pass
//! through before being sent.

pub mod ast;
pub mod charset;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod placeholders;

pub use ast::{Line, Script, Step};
pub use charset::{TriggerEncoder, Utf8Encoder};
pub use interp::{run, ExecuteResult};
pub use parser::parse_script;
pub use placeholders::PlaceholderRegistry;
