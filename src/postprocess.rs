//! Cleaning up captured command output: stripping terminal control bytes
//! and trimming a captured buffer down to the command's actual output.
//!
//! Ported from the original's `utils.go` (`RemoveCtrlChar`, `RemoveNullChar`,
//! `ParseCmdOutput`).

/// Strip NUL, backspace-with-erase, and `ESC [ ... D/J/K` cursor-movement
/// sequences out of one line of terminal output, collapsing it to what
/// would actually be visible on screen.
pub fn remove_ctrl_char(bs: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bs.len());
    let mut i = 0;
    while i < bs.len() {
        match bs[i] {
            0 => {}
            8 => {
                out.pop();
            }
            27 => {
                if bs.get(i + 1) == Some(&b'[') {
                    let (_, code, consumed) = split_escape_key(&bs[i + 2..]);
                    if matches!(code, Some(b'D') | Some(b'J') | Some(b'K')) {
                        out.clear();
                    }
                    i += 1 + consumed;
                } else {
                    i += 1;
                    out.pop();
                    out.pop();
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    out
}

/// Find the end of a `CSI` parameter sequence (digits followed by one
/// terminating letter), returning that letter and how many bytes it spans.
fn split_escape_key(bs: &[u8]) -> (&[u8], Option<u8>, usize) {
    for (i, &b) in bs.iter().enumerate() {
        if !b.is_ascii_digit() {
            return (&bs[..i], Some(b), i + 1);
        }
    }
    (bs, None, 0)
}

/// Drop every NUL byte.
pub fn remove_null_char(bs: &[u8]) -> Vec<u8> {
    bs.iter().copied().filter(|&b| b != 0).collect()
}

fn has_more(bs: &[u8]) -> bool {
    crate::expect::defaults::MORE_PROMPTS
        .iter()
        .any(|p| contains(bs, p.as_bytes()))
}

fn is_more_line(bs: &[u8]) -> bool {
    let mut bs = bs;
    loop {
        let old_len = bs.len();
        bs = trim_ascii_space(bs);
        bs = trim_dashes(bs);
        if bs.len() == old_len {
            break;
        }
        if bs.is_empty() {
            return false;
        }
    }
    bs.eq_ignore_ascii_case(b"more")
}

fn trim_ascii_space(bs: &[u8]) -> &[u8] {
    let start = bs.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bs.len());
    let end = bs.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &bs[start..end]
}

fn trim_dashes(bs: &[u8]) -> &[u8] {
    let start = bs.iter().position(|&b| b != b'-').unwrap_or(bs.len());
    let end = bs.iter().rposition(|&b| b != b'-').map_or(start, |i| i + 1);
    &bs[start..end]
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Clean a multi-line capture, dropping paging ("-- More --") lines and
/// control characters line by line.
pub fn remove_ctrl_char_by_line(lines: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for &line in lines {
        if let Some(cidx) = line.iter().position(|&b| b == 8) {
            if has_more(line) {
                out.extend(remove_ctrl_char(&line[cidx..]));
                out.push(b'\n');
                continue;
            }
        } else if is_more_line(line) {
            continue;
        } else if let Some(cidx) = line.iter().position(|&b| b == 13) {
            if is_more_line(&line[..cidx]) {
                out.extend_from_slice(&line[cidx + 1..]);
                out.push(b'\n');
                continue;
            }
        }
        out.extend(remove_ctrl_char(line));
        out.push(b'\n');
    }
    out
}

/// Trim a captured console buffer down to just a command's output: drop
/// the trailing prompt line, skip back to the last line that looks like a
/// repeated prompt (handles devices that echo the prompt mid-stream), then
/// optionally require a `characteristic` substring and skip past an echoed
/// `cmd` before cleaning control characters line by line.
pub fn extract_command_output(
    bs: &[u8],
    cmd: &[u8],
    prompt: &[u8],
    characteristic: &[u8],
) -> Result<Vec<u8>, String> {
    if bs.is_empty() {
        return Err("console output is empty".into());
    }

    let lines: Vec<&[u8]> = bs.split(|&b| b == b'\n').collect();
    if lines.is_empty() {
        return Err("console output is empty".into());
    }

    let full_prompt = trim_trailing_space(lines[lines.len() - 1]);
    if !prompt.is_empty() && !contains(full_prompt, prompt) {
        return Err(format!(
            "last line of '{}' isn't prompt.",
            String::from_utf8_lossy(bs)
        ));
    }

    let mut lines = &lines[..lines.len() - 1];

    let mut found_idx: Option<usize> = None;
    for (idx, &line) in lines.iter().enumerate() {
        if line.starts_with(full_prompt) {
            found_idx = Some(idx);
        }
    }
    lines = match found_idx {
        Some(i) => &lines[i + 1..],
        None => lines,
    };

    if !characteristic.is_empty() {
        let found = lines.iter().any(|&line| contains(line, characteristic));
        if !found {
            return Err(format!(
                "characteristic '{}' isn't found in '{}'.",
                String::from_utf8_lossy(characteristic),
                String::from_utf8_lossy(bs)
            ));
        }
    }

    if !cmd.is_empty() {
        let mut skip_to = None;
        for (idx, &line) in lines.iter().enumerate().take(3) {
            if !contains(line, cmd) {
                skip_to = Some(idx);
                break;
            }
        }
        if let Some(i) = skip_to {
            lines = &lines[i..];
        }
    }

    Ok(remove_ctrl_char_by_line(lines))
}

fn trim_trailing_space(bs: &[u8]) -> &[u8] {
    let end = bs.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(0, |i| i + 1);
    &bs[..end]
}
