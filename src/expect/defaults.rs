//! The process-wide default matcher catalog and the prompt-string constants
//! every protocol layer shares.
//!
//! The original builds this catalog as a package-level `var` mutated from
//! `init()`. Here it's a [`OnceLock`] built once on first use and never
//! mutated again afterward — the "keep a process-wide immutable default
//! catalog" redesign.

use std::sync::OnceLock;

use super::{matcher, DoFunc, Matcher, SimpleMatcher};
use crate::conn::ConnWrapper;
use crate::errors::ExpectError;

/// The paging prompts a device emits when it wants `[Space]` to continue.
pub const MORE_PROMPTS: &[&str] = &[
    "- More -",
    "-- More --",
    "- more -",
    "-- more --",
    "-More-",
    "--More--",
    "-more-",
    "--more--",
    "-MORE-",
    "--MORE--",
    "- MORE -",
    "-- MORE --",
    "--More(CTRL+C break)--",
    "-- More(CTRL+C break) --",
    "-- More (CTRL+C break) --",
    "--More (CTRL+C break)--",
    "--more(CTRL+C break)--",
    "-- more(CTRL+C break) --",
    "-- more (CTRL+C break) --",
    "--more (CTRL+C break)--",
];

pub const DEFAULT_USER_PROMPTS: &[&str] = &[
    "Username:",
    "username:",
    "login:",
    "Login:",
    "login as:",
    "Login as:",
    "Login As:",
    "login name:",
    "Login Name:",
];

pub const DEFAULT_PASSWORD_PROMPTS: &[&str] = &["Password:", "password:"];

pub const DEFAULT_PROMPTS: &[&str] = &[">", "$", "#"];

pub const DEFAULT_ERROR_PROMPTS: &[&str] = &[
    "Bad secrets",
    "Login invalid",
    "login invalid",
    "Access denied",
    "access denied",
    "Login failed",
    "Authorization fail",
    "authorization fail",
    "Authorizate fail",
    "authorizate fail",
    "Error:",
    "found at '^' position",
];

pub const DEFAULT_PERMISSION_PROMPTS: &[&str] = &[
    "Invalid input detected at '^' marker",
    "Error: Too many parameters found at '^' position",
    "Authorization failed",
    "authorization failed",
    "Authorizate fail",
    "authorizate fail",
    "Command authorization failed.",
    "Unrecognized command found",
];

pub const H3C_SUPER_RESPONSE: &str = "User privilege level is";
pub const DEFAULT_ENABLE_CMD: &str = "enable";

const ANONYMOUS_PASSWORD: &str = "<<anonymous>>";
const NONE_PASSWORD: &str = "<<none>>";
const NONE_USERNAME: &str = "<<none>>";
const EMPTY_PASSWORD: &str = "<<empty>>";

pub fn is_none_username(username: &[u8]) -> bool {
    username == NONE_USERNAME.as_bytes()
}

pub fn is_none_password(password: &[u8]) -> bool {
    password == NONE_PASSWORD.as_bytes() || password == ANONYMOUS_PASSWORD.as_bytes()
}

pub fn is_empty_password(password: &[u8]) -> bool {
    password == EMPTY_PASSWORD.as_bytes()
}

/// `strs` rendered as owned byte-string prompts.
pub fn str_prompts(strs: &[&str]) -> Vec<Vec<u8>> {
    strs.iter().map(|s| s.as_bytes().to_vec()).collect()
}

pub fn byte_prompt(s: &[u8]) -> Vec<Vec<u8>> {
    vec![s.to_vec()]
}

fn action(f: impl Fn(&mut ConnWrapper, &[u8], usize) -> Result<bool, ExpectError> + Send + Sync + 'static) -> DoFunc {
    Box::new(f)
}

pub fn say_yes_crlf() -> DoFunc {
    action(|conn, _bs, _idx| {
        conn.sendln(b"y")?;
        Ok(true)
    })
}

pub fn say_crlf() -> DoFunc {
    action(|conn, _bs, _idx| {
        conn.sendln(b"")?;
        Ok(true)
    })
}

pub fn say_no_crlf() -> DoFunc {
    action(|conn, _bs, _idx| {
        conn.sendln(b"N")?;
        Ok(true)
    })
}

pub fn say_space() -> DoFunc {
    action(|conn, _bs, _idx| {
        conn.send(b" ")?;
        Ok(true)
    })
}

pub fn say_yes() -> DoFunc {
    action(|conn, _bs, _idx| {
        conn.send(b"y")?;
        Ok(true)
    })
}

#[allow(dead_code)]
pub fn say_no() -> DoFunc {
    action(|conn, _bs, _idx| {
        conn.send(b"N")?;
        Ok(true)
    })
}

pub fn return_ok() -> DoFunc {
    action(|_conn, _bs, _idx| Ok(false))
}

pub fn return_err(err: &'static str) -> DoFunc {
    action(move |_conn, _bs, _idx| Err(ExpectError::PermissionDenied(err.to_string())))
}

fn build_default_matchers() -> Vec<Box<dyn Matcher>> {
    let mut out: Vec<Box<dyn Matcher>> = vec![
        Box::new(matcher(byte_prompt(b"Change now? [Y/N]:"), say_no_crlf())),
        Box::new(matcher(byte_prompt(b"Change now?[Y/N]:"), say_no_crlf())),
        Box::new(matcher(byte_prompt(b"change the password?"), say_no_crlf())),
        Box::new(matcher(byte_prompt(b"Store key in cache? (y/n)"), say_yes())),
        Box::new(matcher(
            byte_prompt(b"Update cached key? (y/n, Return cancels connection)"),
            say_yes(),
        )),
        Box::new(matcher(
            byte_prompt(b"Continue with connection? (y/n)"),
            say_yes(),
        )),
        Box::new(matcher(str_prompts(MORE_PROMPTS), say_space())),
    ];

    for prompt in DEFAULT_PERMISSION_PROMPTS {
        out.push(Box::new(matcher(byte_prompt(prompt.as_bytes()), return_err(prompt))));
    }

    out
}

static DEFAULT_MATCHERS: OnceLock<Vec<Box<dyn Matcher>>> = OnceLock::new();

/// The process-wide default matcher catalog, built once on first use.
pub fn default_matchers() -> &'static [Box<dyn Matcher>] {
    DEFAULT_MATCHERS.get_or_init(build_default_matchers)
}

/// Silences the unused-import warning for callers that only need the
/// constructor re-exported here.
#[allow(unused_imports)]
use SimpleMatcher as _;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matchers_built_once_and_in_order() {
        let first = default_matchers();
        let second = default_matchers();
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].prompts(), &[b"Change now? [Y/N]:".to_vec()]);
        assert_eq!(first[6].prompts().len(), MORE_PROMPTS.len());
    }

    #[test]
    fn default_matchers_append_permission_prompts() {
        let catalog = default_matchers();
        assert_eq!(catalog.len(), 7 + DEFAULT_PERMISSION_PROMPTS.len());
    }

    #[test]
    fn sentinel_helpers() {
        assert!(is_none_username(b"<<none>>"));
        assert!(is_none_password(b"<<anonymous>>"));
        assert!(is_empty_password(b"<<empty>>"));
        assert!(!is_none_password(b"real-password"));
    }
}
