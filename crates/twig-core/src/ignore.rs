//! `.twigignore` — working-tree ignore rules.
//!
//! One rule per line. Blank lines and `#` comments are skipped. A line
//! containing `*` or `?` is a file-name glob, anything else names a
//! directory to prune wherever it appears. The control directory is
//! always pruned, whatever the file says.

use std::fs;
use std::path::Path;

use crate::CONTROL_DIR;

/// Ignore file name, looked up at the working root.
pub const IGNORE_FILE: &str = ".twigignore";

/// Directories pruned when no `.twigignore` exists.
const DEFAULT_IGNORE_DIRS: &[&str] = &[".git"];

const MAX_RULES: usize = 1000;
const MAX_PATTERN_LEN: usize = 1024;

/// A parsed set of ignore rules.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    dir_names: Vec<String>,
    file_globs: Vec<String>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        let mut dir_names = vec![CONTROL_DIR.to_string()];
        dir_names.extend(DEFAULT_IGNORE_DIRS.iter().map(|d| d.to_string()));
        Self {
            dir_names,
            file_globs: Vec::new(),
        }
    }
}

impl IgnoreRules {
    /// Load `.twigignore` from the working root, or fall back to defaults.
    pub fn load(root: &Path) -> Self {
        match fs::read_to_string(root.join(IGNORE_FILE)) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse ignore-file content. A present file replaces the defaults.
    pub fn parse(content: &str) -> Self {
        let mut rules = Self {
            dir_names: vec![CONTROL_DIR.to_string()],
            file_globs: Vec::new(),
        };

        let patterns = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter(|l| l.len() <= MAX_PATTERN_LEN)
            .take(MAX_RULES);

        for pattern in patterns {
            if pattern.contains(['*', '?']) {
                rules.file_globs.push(pattern.to_string());
            } else {
                rules
                    .dir_names
                    .push(pattern.trim_end_matches('/').to_string());
            }
        }
        rules
    }

    /// Should a directory with this name be pruned from the walk?
    pub fn is_dir_ignored(&self, name: &str) -> bool {
        self.dir_names.iter().any(|d| d == name)
    }

    /// Should this file be skipped? Matches the file name against globs.
    pub fn is_file_ignored(&self, rel_path: &str) -> bool {
        let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
        self.file_globs.iter().any(|g| glob_match(g, name))
    }
}

/// `*` matches any run of characters, `?` matches exactly one.
///
/// Single pass with one backtrack point: on a mismatch, the most recent
/// `*` absorbs one more character of the text.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < txt.len() {
        match pat.get(pi) {
            Some('*') => {
                backtrack = Some((pi, ti));
                pi += 1;
            }
            Some(&c) if c == '?' || c == txt[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match backtrack {
                Some((star, resume)) => {
                    pi = star + 1;
                    ti = resume + 1;
                    backtrack = Some((star, ti));
                }
                None => return false,
            },
        }
    }

    pat[pi..].iter().all(|&c| c == '*')
}
