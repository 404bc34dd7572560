//! Parsing a script's text into a [`Script`] of [`Step`]s.
//!
//! Line-oriented: blank lines and `#` comments are skipped, a line ending in
//! `{` opens a block closed by a line containing only `}`, and every other
//! line is dispatched by its leading `@verb`/`@@setting` token. Ported from
//! the original's `parseScript`/`Parsers`/`SubParsers` — restructured here as
//! a straight recursive-descent parser producing data (a `Step` enum) rather
//! than closures captured per line.

use crate::errors::ScriptError;
use crate::script::ast::{Line, Script, Step};
use crate::script::charset::TriggerEncoder;
use crate::script::lexer;

const VERBS: &[&str] = &[
    "@connect",
    "@login",
    "@enable",
    "@write",
    "@send",
    "@echo",
    "@sleep",
    "@prompt",
    "@exec",
    "@password",
    "@drain",
    "@@use_crlf",
    "@@read_timeout",
    "@@fail",
];

const TRIGGER_DELIM: &str = "$$$$$$$$";

pub fn parse_script(text: &str, encoder: &dyn TriggerEncoder) -> Result<Script, ScriptError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut cursor = Cursor { lines: &lines, idx: 0 };
    let (script, _) = parse_block(&mut cursor, false, encoder)?;
    Ok(script)
}

struct Cursor<'a> {
    lines: &'a [&'a str],
    idx: usize,
}

impl<'a> Cursor<'a> {
    fn next(&mut self) -> Option<(usize, &'a str)> {
        if self.idx >= self.lines.len() {
            return None;
        }
        let line_no = self.idx + 1;
        let text = self.lines[self.idx];
        self.idx += 1;
        Some((line_no, text))
    }
}

fn parse_err(line: usize, text: &str, message: impl Into<String>) -> ScriptError {
    ScriptError::Parse {
        line,
        text: text.to_string(),
        message: message.into(),
    }
}

/// Returns the parsed block and the line number it ended on (the `}` line,
/// or the last line scanned at end of input).
fn parse_block(
    cursor: &mut Cursor,
    in_block: bool,
    encoder: &dyn TriggerEncoder,
) -> Result<(Script, usize), ScriptError> {
    let start = cursor.idx;
    let mut script = Script::default();
    let mut last_line = start;

    while let Some((line_no, raw)) = cursor.next() {
        last_line = line_no;
        let bs = raw.trim();
        if bs.is_empty() || bs.starts_with('#') {
            continue;
        }

        if bs.ends_with('}') {
            if !in_block {
                return Err(parse_err(line_no, raw, "unexpected block end"));
            }
            if bs != "}" {
                return Err(parse_err(line_no, raw, "a block end must be on its own line"));
            }
            return Ok((script, line_no));
        }

        if let Some(args) = bs.strip_suffix('{') {
            let (sub_script, end_line) = parse_block(cursor, true, encoder)?;
            let args = args.trim_end();
            let (verb, rest) = split_first_word(args);
            if verb != "@trigger" {
                return Err(parse_err(line_no, raw, "unknown command error"));
            }
            let step = parse_trigger(rest, sub_script, line_no, raw, encoder)?;
            script.lines.push(Line {
                line_number: line_no,
                line_text: raw.to_string(),
                command: verb.to_string(),
                step,
            });
            last_line = end_line;
            continue;
        }

        let mut matched = false;
        for &verb in VERBS {
            if let Some(rest) = match_prefix(bs, verb) {
                let step = parse_verb(verb, rest.trim(), line_no, raw)?;
                script.lines.push(Line {
                    line_number: line_no,
                    line_text: raw.to_string(),
                    command: verb.to_string(),
                    step,
                });
                matched = true;
                break;
            }
        }

        if !matched {
            return Err(parse_err(line_no, raw, "unknown command error"));
        }
    }

    if in_block {
        return Err(parse_err(start, "", "block has no closing '}'"));
    }

    Ok((script, last_line))
}

fn match_prefix<'a>(bs: &'a str, verb: &str) -> Option<&'a str> {
    let rest = bs.strip_prefix(verb)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

fn split_first_word(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim_start()),
        None => (s, ""),
    }
}

fn parse_verb(verb: &str, rest: &str, line_no: usize, raw: &str) -> Result<Step, ScriptError> {
    match verb {
        "@connect" => {
            let mut skip_login = false;
            let mut skip_prompt = false;
            let mut skip_enable = false;
            for tok in rest.split_whitespace() {
                match tok.to_ascii_lowercase().as_str() {
                    "auto" | "ssh" | "telnet" => {}
                    "skiplogin" => skip_login = true,
                    "skipprompt" => skip_prompt = true,
                    "skipenable" => skip_enable = true,
                    _ => return Err(parse_err(line_no, raw, format!("'{tok}' is an unknown option"))),
                }
            }
            Ok(Step::Connect {
                skip_login,
                skip_prompt,
                skip_enable,
            })
        }
        "@login" => {
            for tok in rest.split_whitespace() {
                if !tok.eq_ignore_ascii_case("skipenable") {
                    return Err(parse_err(line_no, raw, format!("'{tok}' is an unknown option")));
                }
            }
            Ok(Step::Login)
        }
        "@enable" => Ok(Step::Enable),
        "@write" => parse_write_or_send(rest, true),
        "@send" => parse_write_or_send(rest, false),
        "@echo" => {
            let bytes = lexer::escape_bytes(rest.as_bytes());
            let parts: Vec<Vec<u8>> = split_on(&bytes, TRIGGER_DELIM.as_bytes());
            Ok(Step::Echo(parts))
        }
        "@sleep" => Ok(Step::Sleep(parse_duration(rest, DEFAULT_SLEEP).map_err(|e| parse_err(line_no, raw, e))?)),
        "@prompt" => Ok(Step::Prompt),
        "@exec" => {
            if rest.is_empty() {
                return Err(parse_err(line_no, raw, "command cannot be empty"));
            }
            Ok(Step::Exec(rest.to_string()))
        }
        "@password" => Ok(parse_password_literal(rest)),
        "@drain" => Ok(Step::Drain),
        "@@use_crlf" => Ok(Step::UseCrlf),
        "@@read_timeout" => Ok(Step::ReadTimeout(
            parse_duration(rest, DEFAULT_READ_TIMEOUT).map_err(|e| parse_err(line_no, raw, e))?,
        )),
        "@@fail" => {
            if rest.is_empty() {
                return Err(parse_err(line_no, raw, "@@fail needs a non-empty message"));
            }
            Ok(Step::Fail(rest.to_string()))
        }
        _ => unreachable!("unlisted verb {verb}"),
    }
}

fn parse_write_or_send(rest: &str, is_write: bool) -> Result<Step, ScriptError> {
    match parse_password_literal(rest) {
        Step::WritePassword => return Ok(Step::WritePassword),
        Step::WriteEnablePassword => return Ok(Step::WriteEnablePassword),
        _ => {}
    }
    let bytes = lexer::escape_bytes(rest.as_bytes());
    Ok(if is_write { Step::Write(bytes) } else { Step::Send(bytes) })
}

fn parse_password_literal(rest: &str) -> Step {
    match rest {
        "<<password>>" => Step::WritePassword,
        "<<enable_password>>" => Step::WriteEnablePassword,
        "<<empty>>" => Step::Password(Vec::new()),
        other => Step::Password(other.as_bytes().to_vec()),
    }
}

fn parse_trigger(
    rest: &str,
    sub_script: Script,
    line_no: usize,
    raw: &str,
    encoder: &dyn TriggerEncoder,
) -> Result<Step, ScriptError> {
    if rest.is_empty() {
        return Err(parse_err(line_no, raw, "missing match arguments"));
    }

    let words = lexer::split(rest).map_err(|e| parse_err(line_no, raw, format!("bad arguments: {e}")))?;

    let mut prompts = Vec::new();
    let mut already_more = false;
    for w in words {
        if w.quoted {
            let charset = w.charset.as_deref().unwrap_or("");
            let bytes = encoder
                .encode(charset, &w.text)
                .map_err(|e| parse_err(line_no, raw, format!("bad arguments: {e}")))?;
            prompts.push(bytes);
        } else {
            match w.text.to_ascii_lowercase().as_str() {
                "alreadymore" | "more" => already_more = true,
                other => return Err(parse_err(line_no, raw, format!("'{other}' is an unknown option"))),
            }
        }
    }

    if prompts.is_empty() {
        return Err(parse_err(line_no, raw, "bad arguments: no match string given"));
    }

    Ok(Step::Trigger {
        prompts,
        already_more,
        sub_script,
    })
}

fn split_on(haystack: &[u8], delim: &[u8]) -> Vec<Vec<u8>> {
    if delim.is_empty() {
        return vec![haystack.to_vec()];
    }
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + delim.len() <= haystack.len() {
        if &haystack[i..i + delim.len()] == delim {
            parts.push(haystack[start..i].to_vec());
            i += delim.len();
            start = i;
        } else {
            i += 1;
        }
    }
    parts.push(haystack[start..].to_vec());
    parts
}

const DEFAULT_SLEEP: std::time::Duration = std::time::Duration::from_secs(1);
const DEFAULT_READ_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// A small subset of Go's `time.ParseDuration`: an optional sequence of
/// `<number><unit>` pairs (`ns`/`us`/`ms`/`s`/`m`/`h`), e.g. `1500ms`,
/// `2m30s`. Empty input keeps `default_value`.
fn parse_duration(text: &str, default_value: std::time::Duration) -> Result<std::time::Duration, String> {
    if text.is_empty() {
        return Ok(default_value);
    }

    let mut total = std::time::Duration::ZERO;
    let bytes = text.as_bytes();
    let mut i = 0;
    let mut any = false;
    while i < bytes.len() {
        let num_start = i;
        while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
            i += 1;
        }
        if i == num_start {
            return Err(format!("timeout is invalid - {text}"));
        }
        let num: f64 = text[num_start..i]
            .parse()
            .map_err(|_| format!("timeout is invalid - {text}"))?;

        let unit_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabet_or_u() {
            i += 1;
        }
        let unit = &text[unit_start..i];
        let nanos = match unit {
            "ns" => num,
            "us" | "\u{b5}s" => num * 1_000.0,
            "ms" => num * 1_000_000.0,
            "s" => num * 1_000_000_000.0,
            "m" => num * 60.0 * 1_000_000_000.0,
            "h" => num * 3_600.0 * 1_000_000_000.0,
            _ => return Err(format!("timeout is invalid - {text}")),
        };
        total += std::time::Duration::from_nanos(nanos.round() as u64);
        any = true;
    }

    if !any {
        return Err(format!("timeout is invalid - {text}"));
    }
    Ok(total)
}

trait AsciiAlphaOrU {
    fn is_ascii_alphabet_or_u(&self) -> bool;
}

impl AsciiAlphaOrU for u8 {
    fn is_ascii_alphabet_or_u(&self) -> bool {
        self.is_ascii_alphabetic() || *self == 0xb5
    }
}
