//! Project directory inspection: entry point check, ignore rules, file discovery

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::UsageError;

pub const ENTRYPOINT_SCRIPT_NAME: &str = "start-app.sh";
pub const IGNORE_FILE_NAME: &str = ".dr_apps_ignore";

const SHEBANG: &[u8] = b"#!/";

/// Make sure the project has an executable-looking entry point script.
///
/// Runs before any network call, so a broken project never leaves remote state.
pub fn check_project(root: &Path) -> Result<(), UsageError> {
    let entry_point = root.join(ENTRYPOINT_SCRIPT_NAME);
    if !entry_point.is_file() {
        return Err(UsageError::new(format!(
            "You need to have entrypoint script ({}) as part of your project.",
            ENTRYPOINT_SCRIPT_NAME
        )));
    }

    let mut head = Vec::with_capacity(SHEBANG.len());
    std::fs::File::open(&entry_point)
        .and_then(|file| file.take(SHEBANG.len() as u64).read_to_end(&mut head))
        .map_err(|e| {
            UsageError::new(format!(
                "Failed to read entrypoint script {}: {}",
                entry_point.display(),
                e
            ))
        })?;

    if head != SHEBANG {
        return Err(UsageError::new(format!(
            "Please, use correct script signature in entrypoint script ({}). Eg: `#!/usr/bin/env bash`",
            ENTRYPOINT_SCRIPT_NAME
        )));
    }

    Ok(())
}

/// A regular file inside the project, with its `/`-separated path relative to the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFile {
    pub path: PathBuf,
    pub relative_path: String,
}

impl ProjectFile {
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }

    pub fn is_entrypoint(&self) -> bool {
        self.relative_path == ENTRYPOINT_SCRIPT_NAME
    }
}

#[derive(Debug, Clone)]
struct IgnoreRule {
    pattern: Pattern,
    negated: bool,
    anchored: bool,
    dir_only: bool,
}

impl IgnoreRule {
    fn parse(line: &str) -> Option<Result<Self, glob::PatternError>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (negated, rest) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let (dir_only, rest) = match rest.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, rest),
        };
        let anchored = rest.contains('/');
        let rest = rest.trim_start_matches('/');
        if rest.is_empty() {
            return None;
        }

        Some(Pattern::new(rest).map(|pattern| IgnoreRule {
            pattern,
            negated,
            anchored,
            dir_only,
        }))
    }

    /// Whether this rule covers the file at `relative_path`, either directly or
    /// through one of its parent directories
    fn matches(&self, relative_path: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        let components: Vec<&str> = relative_path.split('/').collect();
        let last = components.len() - 1;

        (0..=last)
            .filter(|&idx| !self.dir_only || idx < last)
            .any(|idx| {
                if self.anchored {
                    let prefix = components[..=idx].join("/");
                    self.pattern.matches_with(&prefix, options)
                } else {
                    self.pattern.matches_with(components[idx], options)
                }
            })
    }
}

/// Gitignore-like rules read from `.dr_apps_ignore`.
///
/// A pattern without `/` matches a name at any depth; a pattern with `/` is
/// anchored at the project root; a trailing `/` only matches directories and
/// everything beneath them; `!` re-includes. The last matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    pub fn parse(content: &str) -> Self {
        let mut rules = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            match IgnoreRule::parse(line) {
                Some(Ok(rule)) => rules.push(rule),
                Some(Err(e)) => warn!(
                    "Skipping invalid ignore pattern on line {}: {} ({})",
                    idx + 1,
                    line.trim(),
                    e
                ),
                None => {}
            }
        }
        Self { rules }
    }

    /// Rules from the project's ignore file; a missing file ignores nothing
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(IGNORE_FILE_NAME);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let rules = Self::parse(&content);
        debug!("Loaded {} ignore rules from {}", rules.len(), path.display());
        Ok(rules)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn is_ignored(&self, relative_path: &str) -> bool {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matches(relative_path))
            .is_some_and(|rule| !rule.negated)
    }
}

/// Every regular file under `root` not excluded by `rules`, sorted by relative path
pub fn discover_files(root: &Path, rules: &IgnoreRules) -> Result<Vec<ProjectFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry =
            entry.with_context(|| format!("Failed to walk project folder {}", root.display()))?;
        // Symlinked files are uploaded as their target; symlinked directories are not entered
        let is_file = if entry.path_is_symlink() {
            entry.path().is_file()
        } else {
            entry.file_type().is_file()
        };
        if !is_file {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("{} is outside of {}", entry.path().display(), root.display()))?;
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if rules.is_ignored(&relative_path) {
            debug!("Ignoring {}", relative_path);
            continue;
        }

        files.push(ProjectFile {
            path: entry.path().to_path_buf(),
            relative_path,
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}
