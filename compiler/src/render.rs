// render.rs — External Graphviz rendering
//
// Invokes the external `dot` layout tool on an emitted .dot file, trying a
// caller-specified list of output formats in preference order until one
// succeeds or the `none` sentinel is reached. Rendering is best-effort and
// strictly downstream: failures here never invalidate the computed
// analysis or the textual graph description already on disk.
//
// Preconditions: `dot_path` names an existing .dot file.
// Postconditions: on success, a rendered file sits next to the .dot file.
// Failure modes: missing tool or all formats failing → `RenderError`.
// Side effects: spawns the external process, writes the rendered file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Format list entry meaning "do not render, emit only the textual graph
/// description".
pub const SKIP_SENTINEL: &str = "none";

/// What rendering produced.
#[derive(Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The tool produced `path` in `format`.
    Rendered { path: PathBuf, format: String },
    /// The sentinel was reached (or no formats were configured).
    Skipped,
}

#[derive(Debug)]
pub enum RenderError {
    /// The layout tool is not installed or not on PATH.
    ToolMissing {
        tool: String,
        source: std::io::Error,
    },
    /// Every configured format failed; (format, reason) per attempt.
    AllFormatsFailed {
        tool: String,
        attempts: Vec<(String, String)>,
    },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::ToolMissing { tool, source } => {
                write!(f, "render tool '{}' unavailable: {}", tool, source)
            }
            RenderError::AllFormatsFailed { tool, attempts } => {
                write!(f, "'{}' failed for every format:", tool)?;
                for (format, reason) in attempts {
                    write!(f, " [{}: {}]", format, reason)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for RenderError {}

/// Render `dot_path` with the system `dot` tool.
pub fn render_dot(dot_path: &Path, formats: &[String]) -> Result<RenderOutcome, RenderError> {
    render_dot_with("dot", dot_path, formats)
}

/// Render with an explicit tool name (injectable for tests).
///
/// Formats are tried in order; a failing format does not prevent trying
/// the next. A missing tool aborts immediately — no format can succeed.
pub fn render_dot_with(
    tool: &str,
    dot_path: &Path,
    formats: &[String],
) -> Result<RenderOutcome, RenderError> {
    let mut attempts = Vec::new();

    for format in formats {
        if format == SKIP_SENTINEL {
            return Ok(RenderOutcome::Skipped);
        }

        let out_path = dot_path.with_extension(format.as_str());
        let result = Command::new(tool)
            .arg(format!("-T{format}"))
            .arg("-o")
            .arg(&out_path)
            .arg(dot_path)
            .output();

        match result {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RenderError::ToolMissing {
                    tool: tool.to_string(),
                    source: e,
                });
            }
            Err(e) => {
                attempts.push((format.clone(), e.to_string()));
            }
            Ok(output) if output.status.success() => {
                return Ok(RenderOutcome::Rendered {
                    path: out_path,
                    format: format.clone(),
                });
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                attempts.push((format.clone(), stderr.trim().to_string()));
            }
        }
    }

    if attempts.is_empty() {
        return Ok(RenderOutcome::Skipped);
    }
    Err(RenderError::AllFormatsFailed {
        tool: tool.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formats(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn temp_dot() -> PathBuf {
        let dir = std::env::temp_dir().join("p4dg_render_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("graph.dot");
        std::fs::write(&path, "digraph g { a -> b; }\n").unwrap();
        path
    }

    #[test]
    fn sentinel_skips_without_invoking() {
        // The bogus tool would error if invoked; the sentinel short-circuits.
        let outcome =
            render_dot_with("p4dg-no-such-tool", &temp_dot(), &formats(&["none", "png"]))
                .unwrap();
        assert_eq!(outcome, RenderOutcome::Skipped);
    }

    #[test]
    fn empty_format_list_skips() {
        let outcome = render_dot_with("p4dg-no-such-tool", &temp_dot(), &[]).unwrap();
        assert_eq!(outcome, RenderOutcome::Skipped);
    }

    #[test]
    fn missing_tool_reported() {
        let err = render_dot_with("p4dg-no-such-tool", &temp_dot(), &formats(&["png"]))
            .unwrap_err();
        assert!(matches!(err, RenderError::ToolMissing { .. }));
        assert!(format!("{err}").contains("p4dg-no-such-tool"));
    }

    #[test]
    fn failing_formats_collected() {
        // `false` exists everywhere and fails for every format without
        // being missing, exercising the retry-next-format path.
        let err =
            render_dot_with("false", &temp_dot(), &formats(&["png", "svg"])).unwrap_err();
        match err {
            RenderError::AllFormatsFailed { attempts, .. } => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].0, "png");
                assert_eq!(attempts[1].0, "svg");
            }
            other => panic!("expected AllFormatsFailed, got {other:?}"),
        }
    }

    #[test]
    fn later_sentinel_still_skips() {
        // A failing format followed by the sentinel: skip, not error.
        let outcome = render_dot_with("false", &temp_dot(), &formats(&["png", "none"])).unwrap();
        assert_eq!(outcome, RenderOutcome::Skipped);
    }
}
