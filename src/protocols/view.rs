//! Descending into a sub-view (e.g. Cisco's `configure terminal`, H3C's
//! `system-view`) by sending a command and waiting for its new prompt.
//!
//! Popping back out ("ExitView") is not a separate protocol call here: a
//! caller just sends the view's exit command and calls this again with the
//! prompt it expects to return to. Tracking the stack of prompts visited is
//! [`crate::session::Session`]'s job, not this layer's.

use std::time::Duration;

use tracing::debug;

use super::get_prompt;
use crate::conn::{CaptureSink, ConnWrapper};
use crate::errors::ExpectError;
use crate::expect::{expect, matcher};
use crate::hexdump::hexdump_if_needed;

/// Send `cmd`, wait for one of `new_prompts` to appear, and return the
/// exact prompt text seen.
pub fn with_view(conn: &mut ConnWrapper, cmd: &[u8], new_prompts: &[Vec<u8>]) -> Result<Vec<u8>, ExpectError> {
    let sink = CaptureSink::new();
    let (_r, _w) = conn.set_tee_output(sink.clone());

    conn.sendln(cmd)?;

    let m = matcher(new_prompts.to_vec(), Box::new(|_conn: &mut ConnWrapper, _bs: &[u8], _idx: usize| Ok(false)));
    expect(conn, &[&m])?;

    conn.drain_off(Duration::from_secs(5))
        .map_err(|e| ExpectError::Other(format!("read prompt failed, drain off, {e}")))?;

    let output = sink.bytes();
    if output.is_empty() {
        return Err(ExpectError::Other("read prompt failed, received is empty".into()));
    }

    let prompt = get_prompt(&output, new_prompts).ok_or_else(|| {
        ExpectError::Other(format!(
            "read prompt failed: \r\n{}",
            hexdump_if_needed(&output)
        ))
    })?;
    debug!(prompt = %String::from_utf8_lossy(&prompt), "entered view");
    Ok(prompt)
}
