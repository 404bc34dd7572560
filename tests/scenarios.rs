//! End-to-end scenarios driven entirely through the in-memory simulator in
//! `tests/common`: a background thread plays a scripted device, the crate's
//! own `Session`/script-interpreter layer drives it exactly as a real
//! telnet/SSH/serial consumer would.

mod common;

use common::{simulate, turn};
use expecthub::config::SessionConfig;
use expecthub::conn::ConnWrapper;
use expecthub::errors::{ExpectError, ScriptError};
use expecthub::script::{self, parse_script, PlaceholderRegistry, Utf8Encoder};
use expecthub::session::Session;

fn session_from_sim(turns: Vec<common::Turn>) -> Session {
    let (pipe, transport) = simulate(turns);
    let conn = ConnWrapper::new(pipe, Box::new(transport));
    Session::new(conn)
}

#[test]
fn telnet_simple_login() {
    let mut session = session_from_sim(vec![
        turn(b"", b"Username:"),
        turn(b"abc\r\n", b"Password:"),
        turn(b"123\r\n", b"ABC>"),
    ]);
    session.use_crlf(true);

    session.login(&[], b"abc", &[], b"123", &[]).unwrap();

    assert_eq!(session.prompt(), b"ABC>");
}

#[test]
fn ssh_enable() {
    let mut session = session_from_sim(vec![
        turn(b"enable\n", b"password:"),
        turn(b"testsx", b"abc#"),
    ]);
    session.set_prompt(b"ABC>".to_vec());

    session.enable(b"", &[], b"testsx", &[]).unwrap();

    assert_eq!(session.prompt(), b"abc#");
}

#[test]
fn cisco_paging_chunks_are_concatenated_without_final_prompt() {
    let mut session = session_from_sim(vec![
        turn(b"show configuration\n", b"chunk-one\r\n--More--"),
        turn(b" ", b"chunk-two\r\n--More--"),
        turn(b" ", b"chunk-three\r\nSwitch#"),
    ]);
    session.set_prompt(b"Switch#".to_vec());

    let out = session.exec(b"show configuration").unwrap();

    assert!(out.windows(b"chunk-one".len()).any(|w| w == b"chunk-one"));
    assert!(out.windows(b"chunk-two".len()).any(|w| w == b"chunk-two"));
    assert!(out.windows(b"chunk-three".len()).any(|w| w == b"chunk-three"));
    assert!(!out.windows(b"Switch#".len()).any(|w| w == b"Switch#"));
}

#[test]
fn h3c_system_view_push_and_pop() {
    let mut session = session_from_sim(vec![
        turn(b"system-view\n", b"[SH_ACS_SW_TG_1]"),
        turn(b"quit\n", b"<H3C>"),
    ]);
    session.set_prompt(b"<H3C>".to_vec());

    session.with_view(b"system-view", &[b"]".to_vec()]).unwrap();
    assert_eq!(session.prompt(), b"[SH_ACS_SW_TG_1]");

    let out = session.exit_view(b"quit").unwrap();
    assert_eq!(session.prompt(), b"<H3C>");
    assert!(out.is_empty(), "exec output should contain only the device's reply, got {out:?}");
}

#[test]
fn trigger_fires_during_login_and_the_post_login_prompt_still_arrives() {
    let mut session = session_from_sim(vec![
        turn(b"", b"abc? [Y/N]:\r\nUsername:"),
        turn(b"abc\r\n", b"Password:"),
        turn(b"123\r\n", b"ABC>"),
    ]);
    session.use_crlf(true);

    let text = "@trigger \"abc? [Y/N]:\" {\n@send N\n}\n@login\n";
    let parsed = parse_script(text, &Utf8Encoder).unwrap();

    let mut config = SessionConfig::default();
    config.credentials.username = "abc".into();
    config.credentials.password = "123".into();
    let placeholders = PlaceholderRegistry::new();

    let results = script::run(&parsed, &mut session, &config, &placeholders).unwrap();

    assert_eq!(session.prompt(), b"ABC>");
    let login_result = results.iter().find(|r| r.command == "@login").unwrap();
    assert_eq!(login_result.sub_results.len(), 1);
}

#[test]
fn fail_string_on_enable_response_aborts_the_step() {
    let mut session = session_from_sim(vec![
        turn(b"enable\n", b"password:"),
        turn(b"testsx", b"% invalid enable password\r\nabc#"),
    ]);
    session.set_prompt(b"abc#".to_vec());

    let text = "@@fail invalid enable password\n@enable\n";
    let parsed = parse_script(text, &Utf8Encoder).unwrap();

    let mut config = SessionConfig::default();
    config.credentials.enable_password = "testsx".into();
    let placeholders = PlaceholderRegistry::new();

    let err = script::run(&parsed, &mut session, &config, &placeholders).unwrap_err();

    assert!(matches!(err, ExpectError::ScriptParse(ScriptError::Step { .. })));
    assert!(err.to_string().contains("invalid enable password"));
}
