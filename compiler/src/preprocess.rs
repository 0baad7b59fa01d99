// preprocess.rs — Minimal preprocessor for P4 sources
//
// Handles the directive subset realistic P4-14 programs rely on before the
// lexer runs: `#include "file"` (resolved against the including file's
// directory, then the `-I` search path, and inlined), `#define NAME VALUE`
// (word-level substitution, together with CLI `-D` pairs), and stripping of
// any other `#` line. Text-level scanning only, in the same spirit as the
// actor-header scanner this module replaces.
//
// Preconditions: `path` names a readable file.
// Postconditions: returned text contains no `#` directives.
// Failure modes: unreadable files and unresolvable includes are
//   `PreprocessError`s (configuration errors — reported before analysis).
// Side effects: reads files from disk.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Maximum include nesting depth before aborting (include cycles).
const MAX_INCLUDE_DEPTH: u32 = 16;

/// Preprocessor configuration: `-I` directories and `-D` definitions,
/// passed through from the CLI untouched.
#[derive(Debug, Clone, Default)]
pub struct PreprocessOptions {
    pub include_dirs: Vec<PathBuf>,
    pub defines: Vec<(String, String)>,
}

/// Errors raised while expanding directives.
#[derive(Debug)]
pub enum PreprocessError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    IncludeNotFound {
        name: String,
        from: PathBuf,
    },
    IncludeDepthExceeded {
        name: String,
    },
    MalformedDirective {
        line: usize,
        text: String,
    },
}

impl fmt::Display for PreprocessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreprocessError::Io { path, source } => {
                write!(f, "{}: {}", path.display(), source)
            }
            PreprocessError::IncludeNotFound { name, from } => {
                write!(
                    f,
                    "cannot resolve #include \"{}\" (included from {})",
                    name,
                    from.display()
                )
            }
            PreprocessError::IncludeDepthExceeded { name } => {
                write!(
                    f,
                    "#include \"{}\" exceeds maximum nesting depth ({})",
                    name, MAX_INCLUDE_DEPTH
                )
            }
            PreprocessError::MalformedDirective { line, text } => {
                write!(f, "line {}: malformed directive '{}'", line, text)
            }
        }
    }
}

impl std::error::Error for PreprocessError {}

/// Preprocess the file at `path`.
pub fn preprocess(path: &Path, opts: &PreprocessOptions) -> Result<String, PreprocessError> {
    let mut defines: HashMap<String, String> = opts.defines.iter().cloned().collect();
    expand_file(path, opts, &mut defines, 0)
}

/// Preprocess an in-memory source string. Includes are resolved relative to
/// `base_dir` (when given) and the configured search path.
pub fn preprocess_str(
    source: &str,
    base_dir: Option<&Path>,
    opts: &PreprocessOptions,
) -> Result<String, PreprocessError> {
    let mut defines: HashMap<String, String> = opts.defines.iter().cloned().collect();
    let from = base_dir
        .map(|d| d.join("<input>"))
        .unwrap_or_else(|| PathBuf::from("<input>"));
    expand_source(source, &from, opts, &mut defines, 0)
}

// ── Expansion ───────────────────────────────────────────────────────────

fn expand_file(
    path: &Path,
    opts: &PreprocessOptions,
    defines: &mut HashMap<String, String>,
    depth: u32,
) -> Result<String, PreprocessError> {
    let source = std::fs::read_to_string(path).map_err(|e| PreprocessError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    expand_source(&source, path, opts, defines, depth)
}

fn expand_source(
    source: &str,
    from: &Path,
    opts: &PreprocessOptions,
    defines: &mut HashMap<String, String>,
    depth: u32,
) -> Result<String, PreprocessError> {
    let mut out = String::with_capacity(source.len());

    for (line_no, line) in source.lines().enumerate() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix('#') {
            let rest = rest.trim_start();
            if let Some(name) = parse_include(rest) {
                if depth >= MAX_INCLUDE_DEPTH {
                    return Err(PreprocessError::IncludeDepthExceeded {
                        name: name.to_string(),
                    });
                }
                let resolved = resolve_include(name, from, opts)?;
                let expanded = expand_file(&resolved, opts, defines, depth + 1)?;
                out.push_str(&expanded);
                if !expanded.ends_with('\n') {
                    out.push('\n');
                }
            } else if rest.starts_with("define") {
                let (name, value) =
                    parse_define(rest).ok_or_else(|| PreprocessError::MalformedDirective {
                        line: line_no + 1,
                        text: line.trim().to_string(),
                    })?;
                defines.insert(name, value);
                out.push('\n');
            } else {
                // Other directives (#ifdef guards, #endif, ...) are stripped.
                out.push('\n');
            }
        } else {
            out.push_str(&substitute(line, defines));
            out.push('\n');
        }
    }

    Ok(out)
}

// ── Directive parsing ───────────────────────────────────────────────────

/// `include "name"` → `Some(name)`.
fn parse_include(rest: &str) -> Option<&str> {
    let rest = rest.strip_prefix("include")?.trim_start();
    let rest = rest.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(&rest[..end])
}

/// `define NAME VALUE` → `Some((NAME, VALUE))`. A bare `define NAME`
/// defines the name as empty (guard-style defines).
fn parse_define(rest: &str) -> Option<(String, String)> {
    let rest = rest.strip_prefix("define")?.trim_start();
    let name_end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if name_end == 0 {
        return None;
    }
    let name = rest[..name_end].to_string();
    let value = rest[name_end..].trim().to_string();
    Some((name, value))
}

fn resolve_include(
    name: &str,
    from: &Path,
    opts: &PreprocessOptions,
) -> Result<PathBuf, PreprocessError> {
    let mut candidates = Vec::new();
    if let Some(parent) = from.parent() {
        candidates.push(parent.join(name));
    }
    for dir in &opts.include_dirs {
        candidates.push(dir.join(name));
    }
    candidates
        .into_iter()
        .find(|c| c.is_file())
        .ok_or_else(|| PreprocessError::IncludeNotFound {
            name: name.to_string(),
            from: from.to_path_buf(),
        })
}

// ── Substitution ────────────────────────────────────────────────────────

/// Replace whole-word occurrences of defined names. Comments are left
/// alone by virtue of never defining names that look like `//`.
fn substitute(line: &str, defines: &HashMap<String, String>) -> String {
    if defines.is_empty() {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len());
    let mut chars = line.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_ascii_alphabetic() || c == '_' {
            let mut end = start;
            while let Some(&(i, c)) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    end = i + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let word = &line[start..end];
            match defines.get(word) {
                Some(value) => out.push_str(value),
                None => out.push_str(word),
            }
        } else {
            out.push(c);
            chars.next();
        }
    }

    out
}
