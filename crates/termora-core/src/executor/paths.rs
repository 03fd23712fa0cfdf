//! Shell payload heuristics: which commands are destructive and which
//! paths they touch.
//!
//! Payloads are split into segments on `;`, `&&`, `||`, `|`, `&` and
//! newlines. Leading environment assignments and wrappers such as `sudo`
//! are skipped to find each segment's command word.

use std::{
    env,
    path::{Component, Path, PathBuf},
};

const DESTRUCTIVE_COMMANDS: &[&str] = &[
    "rm", "rmdir", "mv", "dd", "fdisk", "truncate", "shred", "unlink", "shutdown", "reboot",
];
const RECURSIVE_OWNERSHIP_COMMANDS: &[&str] = &["chmod", "chown", "chgrp"];
const WRAPPERS: &[&str] = &["sudo", "env", "nohup", "time", "nice", "xargs", "command"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Word {
    text: String,
    /// Target of an output redirection (`>`, `>>`, `2>`)
    redirect: bool,
}

type Segment = Vec<Word>;

/// Splits a payload into segments of words, honouring single and double
/// quotes and backslash escapes.
fn lex(payload: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut words: Segment = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut redirect_next = false;
    let mut chars = payload.chars().peekable();

    let flush = |current: &mut String, in_word: &mut bool, words: &mut Segment, redirect: &mut bool| {
        if *in_word {
            words.push(Word {
                text: std::mem::take(current),
                redirect: std::mem::take(redirect),
            });
            *in_word = false;
        }
    };

    while let Some(ch) = chars.next() {
        match ch {
            '\'' | '"' => {
                in_word = true;
                for inner in chars.by_ref() {
                    if inner == ch {
                        break;
                    }
                    current.push(inner);
                }
            }
            '\\' => {
                in_word = true;
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ';' | '\n' | '|' | '&' => {
                flush(&mut current, &mut in_word, &mut words, &mut redirect_next);
                if ch == '&' && chars.peek() == Some(&'>') {
                    // `&>file` redirects both streams
                    chars.next();
                    if chars.peek() == Some(&'>') {
                        chars.next();
                    }
                    redirect_next = true;
                    continue;
                }
                if matches!(ch, '|' | '&') && chars.peek() == Some(&ch) {
                    chars.next();
                }
                redirect_next = false;
                if !words.is_empty() {
                    segments.push(std::mem::take(&mut words));
                }
            }
            '>' => {
                // A bare fd number before `>` belongs to the operator
                if in_word && current.chars().all(|c| c.is_ascii_digit()) {
                    current.clear();
                    in_word = false;
                }
                flush(&mut current, &mut in_word, &mut words, &mut redirect_next);
                if chars.peek() == Some(&'>') {
                    chars.next();
                }
                if chars.peek() == Some(&'&') {
                    // `2>&1` duplicates a descriptor, no file involved
                    chars.next();
                    while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                        chars.next();
                    }
                    continue;
                }
                redirect_next = true;
            }
            c if c.is_whitespace() => {
                flush(&mut current, &mut in_word, &mut words, &mut redirect_next);
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    flush(&mut current, &mut in_word, &mut words, &mut redirect_next);
    if !words.is_empty() {
        segments.push(words);
    }
    segments
}

fn is_env_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !name.starts_with(|c: char| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Index of the command word, skipping env assignments and wrappers.
fn command_index(words: &[Word]) -> Option<usize> {
    let mut index = 0;
    while let Some(word) = words.get(index) {
        if word.redirect || is_env_assignment(&word.text) {
            index += 1;
            continue;
        }
        let name = command_name(&word.text);
        if WRAPPERS.contains(&name) {
            index += 1;
            // Flags of the wrapper, e.g. `sudo -u root`
            while words
                .get(index)
                .is_some_and(|w| w.text.starts_with('-'))
            {
                index += 1;
            }
            continue;
        }
        return Some(index);
    }
    None
}

fn command_name(word: &str) -> &str {
    word.rsplit('/').next().unwrap_or(word)
}

fn arguments(words: &[Word], command: usize) -> impl Iterator<Item = &str> {
    words[command + 1..]
        .iter()
        .filter(|w| !w.redirect)
        .map(|w| w.text.as_str())
}

fn has_flag(words: &[Word], command: usize, short: char, long: &str) -> bool {
    arguments(words, command).any(|arg| {
        arg == long
            || (arg.starts_with('-')
                && !arg.starts_with("--")
                && arg[1..].contains(short))
    })
}

fn is_null_device(target: &str) -> bool {
    target.starts_with("/dev/")
}

fn segment_is_destructive(words: &[Word]) -> bool {
    words
        .iter()
        .any(|w| w.redirect && !is_null_device(&w.text))
        || command_index(words).is_some_and(|command| command_is_destructive(words, command))
}

fn command_is_destructive(words: &[Word], command: usize) -> bool {
    let name = command_name(&words[command].text);

    if DESTRUCTIVE_COMMANDS.contains(&name) || name.starts_with("mkfs") {
        return true;
    }
    if RECURSIVE_OWNERSHIP_COMMANDS.contains(&name) {
        return has_flag(words, command, 'R', "--recursive");
    }
    match name {
        "sed" => arguments(words, command).any(|a| a.starts_with("-i") || a.starts_with("--in-place")),
        "tee" => arguments(words, command).any(|a| !a.starts_with('-') && !is_null_device(a)),
        "git" => {
            let mut args = arguments(words, command).filter(|a| !a.starts_with('-'));
            match args.next() {
                Some("clean") => true,
                Some("reset") => arguments(words, command).any(|a| a == "--hard"),
                _ => false,
            }
        }
        _ => false,
    }
}

/// Whether a shell payload can destroy or overwrite data.
///
/// ```rust
/// use termora_core::executor::paths::is_destructive_command;
///
/// assert!(is_destructive_command("rm -rf build"));
/// assert!(is_destructive_command("echo hi > notes.txt"));
/// assert!(!is_destructive_command("mkdir -p build && ls build"));
/// ```
pub fn is_destructive_command(payload: &str) -> bool {
    lex(payload).iter().any(|words| segment_is_destructive(words))
}

/// Paths a destructive payload is likely to modify, resolved against
/// `cwd`: operands of destructive commands and redirection targets.
/// Arguments a command only reads are left out. Falls back to `cwd` when
/// nothing specific is found.
pub fn extract_target_paths(payload: &str, cwd: &Path) -> Vec<PathBuf> {
    let home = env::var_os("HOME").map(PathBuf::from);
    let mut cwd = cwd.to_path_buf();
    let mut targets: Vec<PathBuf> = Vec::new();

    for words in lex(payload) {
        let mut raw: Vec<&str> = words
            .iter()
            .filter(|w| w.redirect && !is_null_device(&w.text))
            .map(|w| w.text.as_str())
            .collect();

        if let Some(command) = command_index(&words) {
            let name = command_name(&words[command].text);
            if name == "cd" {
                if let Some(dir) = arguments(&words, command).next() {
                    cwd = resolve(dir, &cwd, home.as_deref());
                }
                continue;
            }

            if command_is_destructive(&words, command) {
                raw.extend(destructive_operands(&words, command, name));
                if name == "git" {
                    targets.push(cwd.clone());
                }
            }
        }

        for candidate in raw {
            let resolved = resolve(candidate, &cwd, home.as_deref());
            if resolved.parent().is_some() {
                targets.push(resolved);
            }
        }
    }

    if targets.is_empty() {
        targets.push(cwd);
    }
    outermost(targets)
}

fn destructive_operands<'a>(words: &'a [Word], command: usize, name: &str) -> Vec<&'a str> {
    let operands: Vec<&str> = arguments(words, command)
        .filter(|arg| !arg.starts_with('-'))
        .collect();
    match name {
        "dd" => operands
            .into_iter()
            .filter_map(|arg| arg.strip_prefix("of="))
            .collect(),
        "shutdown" | "reboot" | "git" => Vec::new(),
        // First operand is the mode, owner or sed script
        "chmod" | "chown" | "chgrp" | "sed" => operands.into_iter().skip(1).collect(),
        _ => operands,
    }
}

/// Absolute, normalized form of `arg`. Glob patterns resolve to the
/// directory that holds the matches.
fn resolve(arg: &str, cwd: &Path, home: Option<&Path>) -> PathBuf {
    let expanded = match (arg, home) {
        ("~", Some(home)) => home.to_path_buf(),
        (arg, Some(home)) if arg.starts_with("~/") => home.join(&arg[2..]),
        (arg, _) => PathBuf::from(arg),
    };
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    let mut path = normalize_path(&absolute);
    while path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.contains(['*', '?', '[']))
    {
        path.pop();
    }
    path
}

/// Normalizes a path by resolving "." and ".." components without requiring
/// the path to exist
pub fn normalize_path(path: &Path) -> PathBuf {
    path.components().fold(PathBuf::new(), |mut acc, component| {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                acc.pop();
            }
            _ => acc.push(component),
        }
        acc
    })
}

/// Deduplicates and drops paths nested inside another target.
fn outermost(mut targets: Vec<PathBuf>) -> Vec<PathBuf> {
    targets.sort();
    targets.dedup();
    let mut kept: Vec<PathBuf> = Vec::new();
    for path in targets {
        if !kept.iter().any(|outer| path.starts_with(outer)) {
            kept.push(path);
        }
    }
    kept
}
