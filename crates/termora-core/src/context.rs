//! Working-directory context for a session.
//!
//! The context is detected once per session and passed explicitly to every
//! orchestrator and executor call; nothing here is global.

use std::{
    env, fs,
    path::{Path, PathBuf},
    process::Command,
};

use log::debug;
use serde::{Deserialize, Serialize};

/// Files listed in a planning request.
const MAX_LISTED_FILES: usize = 20;

/// Shell history lines kept, most recent last.
pub const MAX_SHELL_HISTORY: usize = 10;

/// Marker file and the tag it implies.
const PROJECT_MARKERS: &[(&str, &str)] = &[
    ("Cargo.toml", "rust"),
    ("package.json", "node"),
    ("requirements.txt", "python"),
    ("setup.py", "python"),
    ("pyproject.toml", "python"),
    ("go.mod", "go"),
];

/// Where the user is working and what kind of project it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionContext {
    pub directory: PathBuf,
    /// Project name (git remote or repository directory name)
    pub project: Option<String>,
    /// Detected project kinds, e.g. `git`, `rust`
    pub tags: Vec<String>,
    /// Operating system family
    pub os: String,
    /// A few entries of the working directory, newest first
    #[serde(default)]
    pub files: Vec<String>,
    /// Working tree summary when inside a git repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitStatus>,
    /// Recent interactive shell commands, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shell_history: Vec<String>,
}

/// Branch and changed files of a git working tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitStatus {
    /// `None` on a detached HEAD
    pub branch: Option<String>,
    /// Every entry `git status` reports
    pub changed: usize,
    pub counts: GitStatusCounts,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitStatusCounts {
    pub modified: usize,
    pub added: usize,
    pub deleted: usize,
    pub untracked: usize,
}

impl GitStatus {
    /// Parses `git status --porcelain --branch` output.
    pub fn parse_porcelain(output: &str) -> Self {
        let mut status = Self::default();
        for line in output.lines() {
            if let Some(header) = line.strip_prefix("## ") {
                status.branch = parse_branch_header(header);
                continue;
            }
            let Some(code) = line.get(..2) else {
                continue;
            };
            status.changed += 1;
            let counts = &mut status.counts;
            match code {
                "??" => counts.untracked += 1,
                code if code.contains('D') => counts.deleted += 1,
                code if code.starts_with('A') => counts.added += 1,
                code if code.contains('M') => counts.modified += 1,
                _ => {}
            }
        }
        status
    }
}

/// `main...origin/main [ahead 1]`, `No commits yet on main` or
/// `HEAD (no branch)`.
fn parse_branch_header(header: &str) -> Option<String> {
    let name = header
        .strip_prefix("No commits yet on ")
        .or_else(|| header.strip_prefix("Initial commit on "))
        .unwrap_or(header);
    let name = name.split("...").next()?.split_whitespace().next()?;
    (name != "HEAD").then(|| name.to_string())
}

impl SessionContext {
    /// Context without any detection.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            os: std::env::consts::OS.to_string(),
            ..Default::default()
        }
    }

    /// Detects project name, tags and a directory listing for `directory`.
    pub fn detect(directory: impl Into<PathBuf>) -> Self {
        let mut context = Self::new(directory);
        let repo_root = find_repo_root(&context.directory);

        let mut tags = Vec::new();
        if let Some(ref root) = repo_root {
            tags.push("git".to_string());
            context.project = remote_name(root).or_else(|| dir_name(root));
            context.git = git_status(&context.directory);
        }

        let mut marker_dirs = vec![context.directory.clone()];
        if let Some(root) = repo_root.filter(|root| *root != context.directory) {
            marker_dirs.push(root);
        }
        for dir in &marker_dirs {
            for (marker, tag) in PROJECT_MARKERS {
                if dir.join(marker).is_file() && !tags.iter().any(|t| t == tag) {
                    tags.push((*tag).to_string());
                }
            }
        }
        if context.project.is_none() && !tags.is_empty() {
            context.project = dir_name(&context.directory);
        }

        context.tags = tags;
        context.files = list_files(&context.directory);
        if let Some(home) = env::var_os("HOME") {
            context.shell_history =
                read_shell_history(env::var_os("HISTFILE").map(PathBuf::from), Path::new(&home));
        }
        context
    }

    /// Drops what should not leave the machine: shell history.
    pub fn without_private(mut self) -> Self {
        self.shell_history.clear();
        self
    }

    /// Detects the context of the process working directory.
    pub fn current() -> std::io::Result<Self> {
        Ok(Self::detect(std::env::current_dir()?))
    }
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

/// Repository name from the first `url = ...` line of `.git/config`.
fn remote_name(repo_root: &Path) -> Option<String> {
    let config = fs::read_to_string(repo_root.join(".git").join("config")).ok()?;
    let url = config.lines().find_map(|line| {
        let (key, value) = line.trim().split_once('=')?;
        (key.trim() == "url").then(|| value.trim().to_string())
    })?;
    let name = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()?
        .trim_end_matches(".git");
    (!name.is_empty()).then(|| name.to_string())
}

/// `None` when git is missing or the directory is not a work tree.
fn git_status(dir: &Path) -> Option<GitStatus> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["status", "--porcelain", "--branch"])
        .output()
        .inspect_err(|e| debug!("git status unavailable: {e}"))
        .ok()?;
    output
        .status
        .success()
        .then(|| GitStatus::parse_porcelain(&String::from_utf8_lossy(&output.stdout)))
}

/// The last [`MAX_SHELL_HISTORY`] commands from `histfile`, or else from
/// bash or zsh history under `home`.
pub fn read_shell_history(histfile: Option<PathBuf>, home: &Path) -> Vec<String> {
    let candidates = histfile
        .into_iter()
        .chain([home.join(".bash_history"), home.join(".zsh_history")]);
    for path in candidates {
        // zsh writes metadata bytes that are not always UTF-8
        let Ok(bytes) = fs::read(&path) else {
            continue;
        };
        let history = parse_history(&String::from_utf8_lossy(&bytes));
        if !history.is_empty() {
            return history;
        }
    }
    Vec::new()
}

/// Plain lines, or zsh extended lines such as `: 1700000000:0;git pull`.
fn parse_history(content: &str) -> Vec<String> {
    let commands: Vec<String> = content
        .lines()
        .map(|line| match line.strip_prefix(": ") {
            Some(extended) => extended.split_once(';').map_or(extended, |(_, cmd)| cmd),
            None => line,
        })
        .map(str::trim)
        .filter(|cmd| !cmd.is_empty() && !cmd.starts_with('#'))
        .map(str::to_string)
        .collect();
    let skip = commands.len().saturating_sub(MAX_SHELL_HISTORY);
    commands.into_iter().skip(skip).collect()
}

fn dir_name(dir: &Path) -> Option<String> {
    dir.file_name().map(|name| name.to_string_lossy().into_owned())
}

fn list_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut entries: Vec<(std::time::SystemTime, String, bool)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') && name != ".gitignore" {
                return None;
            }
            let meta = entry.metadata().ok()?;
            let modified = meta.modified().ok()?;
            Some((modified, name, meta.is_dir()))
        })
        .collect();
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    entries
        .into_iter()
        .take(MAX_LISTED_FILES)
        .map(|(_, name, is_dir)| if is_dir { format!("{name}/") } else { name })
        .collect()
}
