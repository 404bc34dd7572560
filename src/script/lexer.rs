//! Splitting one script line into words, honoring quoting and a leading
//! `CHARSET"..."` tag. Ported from the original's `split.go`.

/// One word lexed from a line: either a bare (unquoted) identifier or a
/// quoted string, optionally carrying a charset tag (`gbk"..."`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub charset: Option<String>,
    pub quoted: bool,
}

/// Split `line` into [`Word`]s the way a script verb's argument list is
/// split: whitespace-separated, with `"..."`/`'...'` quoting and
/// backslash escapes recognized inside quotes.
pub fn split(line: &str) -> Result<Vec<Word>, String> {
    let chars: Vec<char> = line.chars().collect();
    let mut words = Vec::new();
    let mut i = skip_whitespace(&chars, 0);

    while i < chars.len() {
        match chars[i] {
            '"' => {
                let (word, next) = read_quoted_string(&chars, i + 1, true)?;
                words.push(Word {
                    text: word,
                    charset: None,
                    quoted: true,
                });
                i = next;
            }
            '\'' => {
                let (word, next) = read_quoted_string(&chars, i + 1, false)?;
                words.push(Word {
                    text: word,
                    charset: None,
                    quoted: true,
                });
                i = next;
            }
            _ => {
                let (charset, word, next) = read_ident_string(&chars, i)?;
                words.push(Word {
                    text: word,
                    charset: if charset.is_empty() { None } else { Some(charset) },
                    quoted: !charset.is_empty(),
                });
                i = next;
            }
        }
        i = skip_whitespace(&chars, i);
    }

    Ok(words)
}

/// Split a line into plain strings (the common case, ignoring charset
/// tags) — the original's top-level `Split`.
pub fn tokenize(line: &str) -> Result<Vec<String>, String> {
    Ok(split(line)?.into_iter().map(|w| w.text).collect())
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn read_quoted_string(chars: &[char], mut i: usize, is_dq: bool) -> Result<(String, usize), String> {
    let mut word = String::new();
    let mut escape = false;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                if escape {
                    word.push('\\');
                    escape = false;
                } else {
                    escape = true;
                }
            }
            't' if escape => {
                word.push('\t');
                escape = false;
            }
            'r' if escape => {
                word.push('\r');
                escape = false;
            }
            'n' if escape => {
                word.push('\n');
                escape = false;
            }
            '\'' => {
                if !escape && !is_dq {
                    return Ok((word, i + 1));
                }
                escape = false;
                word.push(c);
            }
            '"' => {
                if !escape && is_dq {
                    return Ok((word, i + 1));
                }
                escape = false;
                word.push(c);
            }
            _ => {
                escape = false;
                word.push(c);
            }
        }
        i += 1;
    }
    Err("expected a closing quote".into())
}

fn read_ident_string(chars: &[char], start: usize) -> Result<(String, String, usize), String> {
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            return Ok((String::new(), chars[start..i].iter().collect(), i));
        }
        if c == '"' {
            let charset: String = chars[start..i].iter().collect();
            let (word, next) = read_quoted_string(chars, i + 1, true)?;
            return Ok((charset, word, next));
        }
        i += 1;
    }
    Ok((String::new(), chars[start..].iter().collect(), i))
}

/// Resolve `\r \n \t \s \\` escapes in an already-split word.
pub fn escape_bytes(bs: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bs.len());
    let mut escaped = false;
    for &b in bs {
        match b {
            b'\\' => {
                if escaped {
                    out.push(b'\\');
                }
                escaped = !escaped;
            }
            b'r' => {
                if escaped {
                    out.push(b'\r');
                    escaped = false;
                } else {
                    out.push(b'r');
                }
            }
            b'n' => {
                if escaped {
                    out.push(b'\n');
                    escaped = false;
                } else {
                    out.push(b'n');
                }
            }
            b't' => {
                if escaped {
                    out.push(b'\t');
                    escaped = false;
                } else {
                    out.push(b't');
                }
            }
            b's' => {
                if escaped {
                    out.push(b' ');
                    escaped = false;
                } else {
                    out.push(b's');
                }
            }
            _ => {
                if escaped {
                    out.push(b'\\');
                }
                escaped = false;
                out.push(b);
            }
        }
    }
    out
}
