//! Console interaction: configuration prompts.

pub mod prompt;

pub use prompt::{Prompter, Question, ScriptedPrompter, TerminalPrompter};
