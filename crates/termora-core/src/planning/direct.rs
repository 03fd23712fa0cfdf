//! Direct shell input that needs no planner.

use std::sync::Arc;

use async_trait::async_trait;

use super::{PlanProvider, PlanRequest, ProposedAction, ProposedPlan};
use crate::error::{Result, TermoraError};

/// Phrases that mark an input as a request rather than a command.
const NATURAL_LANGUAGE_PHRASES: &[&str] = &[
    "find me",
    "show me",
    "search for",
    "list all",
    "can you",
    "please",
    "how many",
    "where are",
    "tell me",
    "what is",
    "how do",
    "help me",
    "i want",
    "i need",
    "could you",
    "would you",
    "get me",
];

const COMMAND_WORDS: &[&str] = &[
    "ls", "cd", "mkdir", "rm", "cp", "mv", "cat", "echo", "grep", "find", "git", "python",
    "python3", "pip", "pip3", "npm", "ssh", "curl", "wget", "sudo", "apt", "brew", "open",
    "touch",
];

/// Command words that also open English requests ("find large files").
/// Their first argument has to look like a path, pattern or flag.
const AMBIGUOUS_COMMANDS: &[&str] = &["find", "open"];

/// Whether `input` reads like a shell command line.
///
/// ```rust
/// use termora_core::planning::is_direct_command;
///
/// assert!(is_direct_command("ls -la | grep rs"));
/// assert!(!is_direct_command("can you list my rust files?"));
/// ```
pub fn is_direct_command(input: &str) -> bool {
    let input = input.trim();
    if input.is_empty() {
        return false;
    }

    let lower = input.to_lowercase();
    if NATURAL_LANGUAGE_PHRASES
        .iter()
        .any(|phrase| lower.contains(phrase))
    {
        return false;
    }
    if input.ends_with('?') {
        return false;
    }

    input.contains(['|', '>', '<', ';'])
        || input.contains("&&")
        || starts_with_command(input)
        || has_flag(input)
}

/// The first word is a known command, matched as a whole word.
fn starts_with_command(input: &str) -> bool {
    let mut words = input.split_whitespace();
    let Some(first) = words.next() else {
        return false;
    };
    if !COMMAND_WORDS.contains(&first) {
        return false;
    }
    if !AMBIGUOUS_COMMANDS.contains(&first) {
        return true;
    }
    words
        .next()
        .is_none_or(|arg| arg.contains(['.', '/', '~', '-', '*']))
}

/// Whitespace followed by `-x` or `--x`.
fn has_flag(input: &str) -> bool {
    let chars: Vec<char> = input.chars().collect();
    chars.windows(3).enumerate().any(|(i, w)| {
        if !w[0].is_whitespace() || w[1] != '-' {
            return false;
        }
        if w[2].is_ascii_alphabetic() {
            return true;
        }
        w[2] == '-' && chars.get(i + 3).is_some_and(char::is_ascii_alphabetic)
    })
}

/// Runs direct commands as one-step plans and hands everything else to an
/// inner provider.
#[derive(Clone, Default)]
pub struct DirectCommandProvider {
    inner: Option<Arc<dyn PlanProvider>>,
}

impl DirectCommandProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inner(inner: Arc<dyn PlanProvider>) -> Self {
        Self { inner: Some(inner) }
    }
}

#[async_trait]
impl PlanProvider for DirectCommandProvider {
    async fn propose_plan(&self, request: &PlanRequest) -> Result<ProposedPlan> {
        if is_direct_command(&request.intent) {
            return Ok(ProposedPlan {
                explanation: format!("Run `{}` as typed", request.intent.trim()),
                actions: vec![ProposedAction {
                    explanation: Some("Direct command".to_string()),
                    ..ProposedAction::shell(request.intent.trim())
                }],
                ..Default::default()
            });
        }

        match &self.inner {
            Some(inner) => inner.propose_plan(request).await,
            None => Err(TermoraError::PlanningFailure {
                message: "no planner is configured for natural-language requests; \
                          set planner_command or TERMORA_PLANNER_COMMAND"
                    .to_string(),
            }),
        }
    }
}
