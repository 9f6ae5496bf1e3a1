use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use log::{debug, trace, warn};

use crate::error::DiagramError;

pub const DEFAULT_DOT_BINARY: &str = "dot";

#[derive(Debug, Clone)]
pub struct LayoutEngine {
    binary: PathBuf,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(DEFAULT_DOT_BINARY)
    }
}

impl LayoutEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Lays out `dot` and returns the rendered SVG.
    pub fn render_svg(&self, dot: &str) -> Result<String, DiagramError> {
        trace!(dot = dot; "layout input");

        let mut child = Command::new(&self.binary)
            .arg("-Tsvg")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DiagramError::LayoutEngine(format!(
                    "failed to start {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| DiagramError::LayoutEngine("layout engine stdin unavailable".into()))?;
        // Written on its own thread so a full stdout pipe cannot stall the child.
        let input = dot.to_string();
        let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child.wait_with_output()?;
        match writer.join() {
            Ok(result) => result?,
            Err(_) => return Err(DiagramError::LayoutEngine("stdin writer panicked".into())),
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in reported_stderr(&stderr) {
            warn!(engine = self.binary.display().to_string(); "{}", line);
        }

        if !output.status.success() {
            return Err(DiagramError::LayoutEngine(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            )));
        }

        let svg = String::from_utf8(output.stdout)
            .map_err(|e| DiagramError::LayoutEngine(format!("output is not UTF-8: {}", e)))?;
        debug!(bytes = svg.len(); "layout complete");
        Ok(svg)
    }
}

/// Stderr lines worth surfacing. Font metric warnings are emitted for every
/// label when a font is missing and are dropped.
fn reported_stderr(stderr: &str) -> impl Iterator<Item = &str> {
    stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !is_font_warning(line))
}

fn is_font_warning(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.contains("font metrics")
        || lower.contains("hard-coded metrics")
        || lower.contains("couldn't load font")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_warnings_are_suppressed() {
        let stderr = "Warning: no hard-coded metrics for 'Helvetica:style=Light'. Falling back to 'Times' metrics\n\
                      Warning: Couldn't load font \"Helvetica\"\n\
                      \n\
                      Warning: node_a, position 1,2, expected two floats\n";
        let kept: Vec<_> = reported_stderr(stderr).collect();
        assert_eq!(kept, vec!["Warning: node_a, position 1,2, expected two floats"]);
    }

    #[test]
    fn font_metric_lines_are_filtered() {
        assert!(is_font_warning("Warning: using default font metrics for Foo"));
        assert!(!is_font_warning("Error: syntax error in line 3"));
    }

    #[test]
    fn missing_binary_is_a_layout_error() {
        let engine = LayoutEngine::new("/nonexistent/stackdiagram-dot");
        let err = engine.render_svg("digraph { a; }").unwrap_err();
        assert!(matches!(err, DiagramError::LayoutEngine(_)));
    }
}
