//! Natural-language command suggestions
//!
//! The multiplexer only knows the [`Translator`] trait. What answers it is an
//! external program configured by the user; nothing here interprets prompts.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::MuxError;

/// A translated command
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Translation {
    pub command: String,
    pub explanation: String,
}

/// What the user is shown after asking for a command
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Suggestion {
    pub prompt: String,
    pub command: String,
    pub explanation: String,
    /// False for informational results such as translation failures
    pub executable: bool,
}

impl Suggestion {
    pub fn from_translation(prompt: &str, translation: Translation) -> Self {
        Self {
            prompt: prompt.to_string(),
            command: translation.command,
            explanation: translation.explanation,
            executable: true,
        }
    }

    pub fn from_error(prompt: &str, error: &MuxError) -> Self {
        Self {
            prompt: prompt.to_string(),
            command: String::new(),
            explanation: error.to_string(),
            executable: false,
        }
    }
}

/// Turns a natural-language request into a shell command
pub trait Translator {
    fn translate(&mut self, prompt: &str, cwd: &Path) -> Result<Translation, MuxError>;
}

/// Used when no assistant command is configured
pub struct UnconfiguredTranslator;

impl Translator for UnconfiguredTranslator {
    fn translate(&mut self, _prompt: &str, _cwd: &Path) -> Result<Translation, MuxError> {
        Err(MuxError::Translation(
            "no assistant configured; set [assistant] command in config.toml".to_string(),
        ))
    }
}

/// Runs an external program per request.
///
/// The prompt goes to the program's stdin and the directory to `PANEMUX_CWD`.
/// The first non-empty output line is the command, the rest the explanation.
pub struct CommandTranslator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandTranslator {
    /// `command_line` is split on whitespace into program and arguments.
    pub fn new(command_line: &str, timeout: Duration) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }

    fn run(&self, prompt: &str, cwd: &Path) -> Result<Output, MuxError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("PANEMUX_CWD", cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MuxError::Translation(format!("{}: {}", self.program, e)))?;

        // Pipes are drained while we wait so a chatty program cannot block
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        if let Some(mut stdin) = child.stdin.take() {
            // A program that ignores stdin may close it early
            if let Err(e) = stdin.write_all(prompt.as_bytes()) {
                debug!(error = %e, "assistant stdin closed early");
            }
        }

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(MuxError::Translation(format!(
                        "{} timed out after {:?}",
                        self.program, self.timeout
                    )));
                }
                Ok(None) => thread::sleep(Duration::from_millis(10)),
                Err(e) => return Err(MuxError::Translation(format!("{}: {}", self.program, e))),
            }
        };

        Ok(Output {
            status,
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }
}

/// Read a child pipe to the end on its own thread
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    let mut pipe = pipe?;
    Some(thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            debug!(error = %e, "assistant pipe read failed");
        }
        buf
    }))
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader.and_then(|h| h.join().ok()).unwrap_or_default()
}

impl Translator for CommandTranslator {
    fn translate(&mut self, prompt: &str, cwd: &Path) -> Result<Translation, MuxError> {
        info!(program = %self.program, cwd = %cwd.display(), "asking assistant");
        let output = self.run(prompt, cwd)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, "assistant failed");
            return Err(MuxError::Translation(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        parse_translation(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Split program output into command and explanation
fn parse_translation(output: &str) -> Result<Translation, MuxError> {
    let mut lines = output.lines().skip_while(|l| l.trim().is_empty());
    let command = lines
        .next()
        .map(|l| l.trim().to_string())
        .ok_or_else(|| MuxError::Translation("assistant returned nothing".to_string()))?;
    let explanation = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    Ok(Translation {
        command,
        explanation,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    use super::*;

    /// Returns canned answers and records what it was asked
    #[derive(Clone, Default)]
    pub struct ScriptedTranslator {
        pub answer: Option<Translation>,
        pub asked: Rc<RefCell<Vec<(String, PathBuf)>>>,
    }

    impl Translator for ScriptedTranslator {
        fn translate(&mut self, prompt: &str, cwd: &Path) -> Result<Translation, MuxError> {
            self.asked.borrow_mut().push((prompt.to_string(), cwd.to_path_buf()));
            self.answer
                .clone()
                .ok_or_else(|| MuxError::Translation("offline".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_and_explanation() {
        let t = parse_translation("\nls -la\nlists files\nincluding hidden ones\n").unwrap();
        assert_eq!(t.command, "ls -la");
        assert_eq!(t.explanation, "lists files\nincluding hidden ones");

        let t = parse_translation("pwd").unwrap();
        assert_eq!(t.explanation, "");
    }

    #[test]
    fn test_parse_empty_output_fails() {
        assert!(matches!(parse_translation("  \n\n"), Err(MuxError::Translation(_))));
    }

    #[test]
    fn test_unconfigured_always_fails() {
        let err = UnconfiguredTranslator
            .translate("list files", Path::new("/"))
            .unwrap_err();
        let suggestion = Suggestion::from_error("list files", &err);
        assert!(!suggestion.executable);
        assert!(suggestion.explanation.contains("no assistant configured"));
    }

    #[test]
    fn test_empty_command_line_is_rejected() {
        assert!(CommandTranslator::new("   ", Duration::from_secs(1)).is_none());
    }

    #[test]
    #[cfg(unix)]
    fn test_command_translator_reads_stdin_and_cwd() {
        // Echo the directory as the command and the prompt as the explanation
        let mut translator = CommandTranslator {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "printf 'cd %s\\n' \"$PANEMUX_CWD\"; cat".to_string(),
            ],
            timeout: Duration::from_secs(5),
        };
        let t = translator.translate("go home", Path::new("/tmp")).unwrap();
        assert_eq!(t.command, "cd /tmp");
        assert_eq!(t.explanation, "go home");
    }

    #[test]
    #[cfg(unix)]
    fn test_command_translator_nonzero_exit_fails() {
        let mut translator = CommandTranslator::new("false", Duration::from_secs(5)).unwrap();
        let err = translator.translate("anything", Path::new("/")).unwrap_err();
        assert!(matches!(err, MuxError::Translation(_)));
    }

    #[test]
    #[cfg(unix)]
    fn test_command_translator_large_output_does_not_stall() {
        // Well past a pipe buffer
        let mut translator = CommandTranslator {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "echo 'ls -la'; head -c 200000 /dev/zero | tr '\\0' x".to_string(),
            ],
            timeout: Duration::from_secs(5),
        };
        let started = Instant::now();
        let t = translator.translate("list", Path::new("/")).unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(t.command, "ls -la");
        assert_eq!(t.explanation.len(), 200_000);
    }

    #[test]
    #[cfg(unix)]
    fn test_command_translator_times_out() {
        let mut translator = CommandTranslator::new("sleep 5", Duration::from_millis(100)).unwrap();
        let err = translator.translate("wait", Path::new("/")).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
