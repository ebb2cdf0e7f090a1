//! Diagnostic records for per-region failures

use serde::Serialize;
use std::fmt;

use crate::region::LineRange;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticLevel {
    /// Informational
    Info,
    /// Something the user should look at, e.g. a missing referenced file
    Warning,
    /// A region failed to parse or render
    Error,
}

/// A diagnostic emitted while delimiting or rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    /// Human-readable message
    pub message: String,
    /// Pipeline stage that produced it (e.g., "delimit", "render", "config")
    pub source: String,
    /// Affected buffer lines, if tied to a region
    pub range: Option<LineRange>,
}

impl Diagnostic {
    pub fn new(
        level: DiagnosticLevel,
        message: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            level,
            message: message.into(),
            source: source.into(),
            range: None,
        }
    }

    pub fn info(message: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, message, source)
    }

    pub fn warning(message: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warning, message, source)
    }

    pub fn error(message: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, message, source)
    }

    /// Attach the affected line range
    pub fn at(mut self, range: LineRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Forward to the `log` facade at the matching level
    pub fn log(&self) {
        match self.level {
            DiagnosticLevel::Info => log::info!("{}", self),
            DiagnosticLevel::Warning => log::warn!("{}", self),
            DiagnosticLevel::Error => log::error!("{}", self),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range {
            Some(range) => write!(f, "[{}] lines {}: {}", self.source, range, self.message),
            None => write!(f, "[{}] {}", self.source, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_warning() {
        let diag = Diagnostic::warning("File not found: fig.plt", "render");
        assert_eq!(diag.level, DiagnosticLevel::Warning);
        assert_eq!(diag.message, "File not found: fig.plt");
        assert_eq!(diag.source, "render");
        assert_eq!(diag.range, None);
    }

    #[test]
    fn test_create_error_with_range() {
        let diag = Diagnostic::error("bad height", "delimit").at(LineRange::new(3, 5));
        assert_eq!(diag.level, DiagnosticLevel::Error);
        assert_eq!(diag.to_string(), "[delimit] lines 3-5: bad height");
    }

    #[test]
    fn test_display_without_range() {
        let diag = Diagnostic::info("Using defaults", "config");
        assert_eq!(diag.to_string(), "[config] Using defaults");
    }
}
