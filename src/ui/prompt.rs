use std::io::{self, BufRead, Write};

/// One interactive question; `env` pre-answers it when set and non-empty.
#[derive(Debug, Clone, Copy)]
pub struct Question {
    pub label: &'static str,
    pub env: &'static str,
    pub secret: bool,
    pub default: Option<&'static str>,
}

/// Source of answers for the configuration questions.
pub trait Prompter {
    fn ask(&mut self, question: &Question) -> io::Result<String>;
}

/// Prompts on stderr and reads stdin; secrets are read with terminal echo disabled.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &Question) -> io::Result<String> {
        let use_err = crate::color_enabled_stderr();
        let label = match question.default {
            Some(d) => format!("{} [{}]: ", question.label, d),
            None => format!("{}: ", question.label),
        };
        eprint!("{}", crate::paint(use_err, crate::ANSI_PROMPT, &label));
        io::stderr().flush()?;

        let hide = question.secret && atty::is(atty::Stream::Stdin);
        let saved = if hide { stty_disable_echo() } else { None };
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line);
        if hide {
            stty_restore(saved);
            eprintln!();
        }
        if read? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("no answer for '{}' (stdin closed)", question.label),
            ));
        }
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }
}

#[cfg(unix)]
fn stty_disable_echo() -> Option<String> {
    let saved = std::process::Command::new("stty")
        .arg("-g")
        .stdin(std::process::Stdio::inherit())
        .output()
        .ok()
        .and_then(|o| {
            if o.status.success() {
                Some(String::from_utf8_lossy(&o.stdout).trim().to_string())
            } else {
                None
            }
        });
    let _ = std::process::Command::new("stty")
        .arg("-echo")
        .stdin(std::process::Stdio::inherit())
        .status();
    saved
}

#[cfg(unix)]
fn stty_restore(saved: Option<String>) {
    let arg = saved.unwrap_or_else(|| "echo".to_string());
    let _ = std::process::Command::new("stty")
        .arg(&arg)
        .stdin(std::process::Stdio::inherit())
        .status();
}

#[cfg(not(unix))]
fn stty_disable_echo() -> Option<String> {
    None
}

#[cfg(not(unix))]
fn stty_restore(_saved: Option<String>) {}

/// Fixed answers in question order; used by tests and scripted callers.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: std::collections::VecDeque<String>,
    pub asked: Vec<&'static str>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &Question) -> io::Result<String> {
        self.asked.push(question.label);
        self.answers.pop_front().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("no scripted answer for '{}'", question.label),
            )
        })
    }
}
