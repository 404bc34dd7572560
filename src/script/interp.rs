//! Running a parsed [`Script`] against a live [`Session`].
//!
//! Ported from the original's `Script.Run`: each step's incoming/outgoing
//! bytes are captured via the connection's tee hooks into an
//! [`ExecuteResult`], and a step that completes cleanly but whose captured
//! input contains a registered fail string is turned into an error anyway —
//! matching the original's post-hoc `FailStrings` scan.
//!
//! `@trigger` is simplified relative to the original: instead of being
//! wired into the low-level byte-expect loop as a live interrupt (`conn.On`),
//! a trigger here is checked against each subsequent step's *whole* captured
//! output once that step finishes. This means a trigger can't interrupt a
//! single long-running `@exec` mid-command the way the original can, but it
//! still reacts to the same prompts and runs the same sub-script between
//! steps — the common case (a paging or confirmation prompt appearing
//! between commands) behaves identically either way.

use std::thread;

use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::errors::{ExpectError, ScriptError};
use crate::script::ast::{Line, Script, Step};
use crate::script::placeholders::PlaceholderRegistry;
use crate::session::Session;

/// The captured record of one executed script line, mirroring the
/// original's `ExecuteResult`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ExecuteResult {
    pub line_number: usize,
    pub line_text: String,
    pub command: String,
    pub incoming: Vec<u8>,
    pub outgoing: Vec<u8>,
    pub sub_results: Vec<ExecuteResult>,
}

pub fn run(
    script: &Script,
    session: &mut Session,
    config: &SessionConfig,
    placeholders: &PlaceholderRegistry,
) -> Result<Vec<ExecuteResult>, ExpectError> {
    let mut results = Vec::with_capacity(script.lines.len());
    let mut active_triggers: Vec<&Line> = Vec::new();

    for line in &script.lines {
        if matches!(line.step, Step::Trigger { .. }) {
            active_triggers.push(line);
            results.push(ExecuteResult {
                line_number: line.line_number,
                line_text: line.line_text.clone(),
                command: line.command.clone(),
                ..Default::default()
            });
            continue;
        }

        let (step_result, incoming, outgoing) =
            session.with_tee(|session| run_step(&line.step, session, config, placeholders));

        let result = ExecuteResult {
            line_number: line.line_number,
            line_text: line.line_text.clone(),
            command: line.command.clone(),
            incoming,
            outgoing,
            sub_results: Vec::new(),
        };

        if let Err(err) = step_result {
            results.push(result);
            return Err(wrap_step_error(line, err));
        }

        results.push(result);
        let incoming = &results.last().unwrap().incoming;

        if session.fail_strings().iter().any(|f| contains(incoming, f)) {
            let msg = String::from_utf8_lossy(incoming).into_owned();
            warn!(line = line.line_number, command = %line.command, "fail string matched, aborting script");
            return Err(wrap_step_error(line, ExpectError::Other(msg)));
        }

        for trig_line in &active_triggers {
            let Step::Trigger { prompts, sub_script, .. } = &trig_line.step else {
                continue;
            };
            let fired = prompts.iter().any(|p| contains(&results.last().unwrap().incoming, p));
            if !fired {
                continue;
            }
            info!(trigger_line = trig_line.line_number, "trigger fired, running sub-script");
            match run(sub_script, session, config, placeholders) {
                Ok(sub_results) => results.last_mut().unwrap().sub_results = sub_results,
                Err(err) => return Err(wrap_step_error(trig_line, err)),
            }
        }
    }

    Ok(results)
}

fn wrap_step_error(line: &Line, err: ExpectError) -> ExpectError {
    ExpectError::ScriptParse(ScriptError::Step {
        line: line.line_number,
        command: line.command.clone(),
        source: Box::new(err),
    })
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

fn run_step(
    step: &Step,
    session: &mut Session,
    config: &SessionConfig,
    placeholders: &PlaceholderRegistry,
) -> Result<(), ExpectError> {
    match step {
        Step::Connect {
            skip_login,
            skip_prompt,
            skip_enable,
        } => {
            if !session.has_connection() {
                return Err(ExpectError::Other("no connection available".into()));
            }

            if !*skip_login {
                session.login(
                    &config.user_prompts_bytes(),
                    config.credentials.username.as_bytes(),
                    &config.password_prompts_bytes(),
                    config.credentials.password.as_bytes(),
                    &config.prompts_bytes(),
                )?;
            } else if !*skip_prompt {
                session.read_prompt(&config.prompts_bytes())?;
            }

            if !*skip_enable {
                session.enable(
                    config.credentials.enable_command.as_bytes(),
                    &config.password_prompts_bytes(),
                    config.credentials.enable_password.as_bytes(),
                    &config.prompts_bytes(),
                )?;
            }

            Ok(())
        }
        Step::Login => session.login(
            &config.user_prompts_bytes(),
            config.credentials.username.as_bytes(),
            &config.password_prompts_bytes(),
            config.credentials.password.as_bytes(),
            &config.prompts_bytes(),
        ),
        Step::Enable => session.enable(
            config.credentials.enable_command.as_bytes(),
            &config.password_prompts_bytes(),
            config.credentials.enable_password.as_bytes(),
            &config.prompts_bytes(),
        ),
        Step::Write(bs) => {
            let resolved = placeholders.substitute(bs, &config.credentials, session.variables())?;
            session.write(&resolved)
        }
        Step::Send(bs) => {
            let resolved = placeholders.substitute(bs, &config.credentials, session.variables())?;
            session.sendln(&resolved)
        }
        Step::WritePassword => session.send_password(config.credentials.password.as_bytes()),
        Step::WriteEnablePassword => session.send_password(config.credentials.enable_password.as_bytes()),
        Step::Echo(prompts) => session.echo(prompts.clone()),
        Step::Sleep(d) => {
            thread::sleep(*d);
            Ok(())
        }
        Step::Prompt => session.read_prompt(&[]),
        Step::Exec(cmd) => session.exec(cmd.as_bytes()).map(|_| ()),
        Step::Password(bs) => session.send_password(bs),
        Step::Drain => session.drain_off(std::time::Duration::ZERO).map(|_| ()),
        Step::UseCrlf => {
            session.use_crlf(true);
            Ok(())
        }
        Step::ReadTimeout(d) => session.set_read_deadline(*d),
        Step::Fail(msg) => {
            session.add_fail_string(msg);
            Ok(())
        }
        Step::Trigger { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::ConnWrapper;
    use crate::pipe::Pipe;
    use crate::script::charset::Utf8Encoder;
    use crate::script::parser::parse_script;
    use crate::transport::test_support::RecordingTransport;
    use std::sync::Arc;

    fn session_with_bytes(bytes: &[u8]) -> Session {
        let pipe = Arc::new(Pipe::new(0));
        pipe.write(bytes).unwrap();
        let conn = ConnWrapper::new(pipe, Box::new(RecordingTransport::default()));
        Session::new(conn)
    }

    #[test]
    fn runs_login_and_exec_steps() {
        let text = "@login\n@exec show version\n";
        let script = parse_script(text, &Utf8Encoder).unwrap();

        let mut session = session_with_bytes(b"Username: Password: router#show version\r\nVersion 1.0\r\nrouter#");
        session.set_prompt(b"router#".to_vec());

        let mut config = SessionConfig::default();
        config.credentials.username = "admin".into();
        config.credentials.password = "hunter2".into();
        let placeholders = PlaceholderRegistry::new();

        let results = run(&script, &mut session, &config, &placeholders).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].command, "@exec");
    }

    #[test]
    fn connect_composes_login_and_skips_enable() {
        let text = "@connect skipprompt skipenable\n";
        let script = parse_script(text, &Utf8Encoder).unwrap();

        let mut session = session_with_bytes(b"Username: \r\nPassword: \r\nABC>");

        let mut config = SessionConfig::default();
        config.credentials.username = "admin".into();
        config.credentials.password = "hunter2".into();
        let placeholders = PlaceholderRegistry::new();

        let results = run(&script, &mut session, &config, &placeholders).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(session.prompt(), b"ABC>");
        assert!(results[0].incoming.windows(b"ABC>".len()).any(|w| w == b"ABC>"));
    }

    #[test]
    fn connect_with_skiplogin_reads_prompt_directly() {
        let text = "@connect skiplogin skipenable\n";
        let script = parse_script(text, &Utf8Encoder).unwrap();

        let mut session = session_with_bytes(b"router>");

        let config = SessionConfig::default();
        let placeholders = PlaceholderRegistry::new();

        run(&script, &mut session, &config, &placeholders).unwrap();
        assert_eq!(session.prompt(), b"router>");
    }

    #[test]
    fn fail_string_in_output_aborts_with_step_error() {
        let text = "@exec show version\n";
        let script = parse_script(text, &Utf8Encoder).unwrap();

        let mut session = session_with_bytes(b"show version\r\nError: bad command\r\nrouter#");
        session.set_prompt(b"router#".to_vec());
        session.add_fail_string("Error:");

        let config = SessionConfig::default();
        let placeholders = PlaceholderRegistry::new();

        let err = run(&script, &mut session, &config, &placeholders).unwrap_err();
        assert!(matches!(err, ExpectError::ScriptParse(ScriptError::Step { .. })));
    }

    #[test]
    fn trigger_runs_sub_script_when_its_prompt_appears_in_later_output() {
        let text = "@trigger \"More\" {\n@send  \n}\n@exec show run\n";
        let script = parse_script(text, &Utf8Encoder).unwrap();

        let mut session = session_with_bytes(b"show run\r\n--More--router#");
        session.set_prompt(b"router#".to_vec());

        let config = SessionConfig::default();
        let placeholders = PlaceholderRegistry::new();

        let results = run(&script, &mut session, &config, &placeholders).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].sub_results.len(), 1);
    }
}
