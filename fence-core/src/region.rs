//! Renderable regions of a buffer

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::identity;
use crate::params::{NodeParams, ParseError};

/// Inclusive, 1-based line range in the current buffer snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    /// Create a range, clamping `end` so it never precedes `start`
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Range of `height` lines beginning at `start`
    pub fn spanning(start: usize, height: usize) -> Self {
        Self::new(start, start.saturating_add(height.max(1) - 1))
    }

    /// Convert to a 0-based inclusive pair for hosts that count from zero
    pub fn to_zero_based(&self) -> (usize, usize) {
        (self.start.saturating_sub(1), self.end.saturating_sub(1))
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Content kind of a region, selects the renderer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Math,
    Tex,
    Gnuplot,
    File,
    /// Unsupported fence, carries the declared tag
    Other(String),
}

impl RegionKind {
    /// Classify a declared fence tag (case-insensitive)
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "math" => RegionKind::Math,
            "tex" | "latex" => RegionKind::Tex,
            "gnuplot" => RegionKind::Gnuplot,
            _ => RegionKind::Other(tag.to_string()),
        }
    }

    /// Display filetype; `None` for file references
    pub fn filetype(&self) -> Option<&str> {
        match self {
            RegionKind::Math => Some("math"),
            RegionKind::Tex => Some("tex"),
            RegionKind::Gnuplot => Some("gnuplot"),
            RegionKind::File => None,
            RegionKind::Other(tag) => Some(tag.as_str()),
        }
    }
}

/// A classified span of buffer text or a file reference slated for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    /// Content hash, also the artifact file stem
    pub identity: String,
    pub range: LineRange,
    pub kind: RegionKind,
    /// Raw body lines of a fence
    pub content: Option<Vec<String>>,
    /// Referenced path of a file region, possibly `~`-relative
    pub file_path: Option<String>,
    /// Raw marker tokens, type tag first
    pub declared_params: Vec<String>,
}

impl Region {
    /// Build a fence region whose marker sits on `marker_line`
    ///
    /// The height defaults to the body's newline count plus the two marker lines.
    pub fn fence(
        marker_line: usize,
        declared_params: Vec<String>,
        body: &str,
    ) -> Result<Self, ParseError> {
        let params = NodeParams::parse(&declared_params)?;
        let height = params
            .height
            .unwrap_or_else(|| body.matches('\n').count() + 2);

        let content: Vec<String> = body.lines().map(str::to_string).collect();

        Ok(Self {
            identity: identity::fence_identity(&content),
            range: LineRange::spanning(marker_line, height),
            kind: RegionKind::from_tag(&params.tag),
            content: Some(content),
            file_path: None,
            declared_params,
        })
    }

    /// Build a file region for a reference on `reference_line`
    ///
    /// The reserved area starts on the next line and covers the trailing blank
    /// lines, never fewer than `min_height`. Returns `None` for an empty path.
    pub fn file(
        reference_line: usize,
        path: &str,
        blank_lines: usize,
        min_height: usize,
    ) -> Option<Self> {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }

        Some(Self {
            identity: identity::file_identity(path),
            range: LineRange::spanning(reference_line + 1, blank_lines.max(min_height)),
            kind: RegionKind::File,
            content: None,
            file_path: Some(path.to_string()),
            declared_params: Vec::new(),
        })
    }

    /// Display filetype (the raw tag for unsupported fences)
    pub fn filetype(&self) -> Option<&str> {
        self.kind.filetype()
    }

    /// Trimmed fence body, as handed to renderers
    pub fn body(&self) -> Option<String> {
        self.content.as_deref().map(identity::fence_body)
    }

    /// Resolve the referenced file against a base directory
    ///
    /// `~` expands to the home directory; relative paths are joined onto `base_dir`
    /// when given. The file is not required to exist.
    pub fn resolve_file(&self, base_dir: Option<&Path>) -> Option<PathBuf> {
        let raw = self.file_path.as_deref()?;
        let expanded = expand_home(raw);

        if expanded.is_absolute() {
            return Some(expanded);
        }

        match base_dir {
            Some(dir) => Some(dir.join(expanded)),
            None => Some(expanded),
        }
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(raw: &str) -> PathBuf {
    let rest = if raw == "~" {
        Some("")
    } else {
        raw.strip_prefix("~/")
    };

    match (rest, directories::BaseDirs::new()) {
        (Some(rest), Some(dirs)) => dirs.home_dir().join(rest),
        _ => PathBuf::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        assert_eq!(RegionKind::from_tag("MATH"), RegionKind::Math);
        assert_eq!(RegionKind::from_tag("LaTeX"), RegionKind::Tex);
        assert_eq!(RegionKind::from_tag("tex"), RegionKind::Tex);
        assert_eq!(RegionKind::from_tag("Gnuplot"), RegionKind::Gnuplot);
    }

    #[test]
    fn test_unknown_tag_keeps_raw_filetype() {
        let kind = RegionKind::from_tag("Python");
        assert_eq!(kind, RegionKind::Other("Python".to_string()));
        assert_eq!(kind.filetype(), Some("Python"));
    }

    #[test]
    fn test_fence_default_height() {
        let region = Region::fence(2, tokens(&["math"]), "x^2\n").unwrap();
        assert_eq!(region.range, LineRange::new(2, 4));
        assert_eq!(region.content, Some(vec!["x^2".to_string()]));
        assert_eq!(region.identity, identity::hash_content("x^2"));
        assert_eq!(region.filetype(), Some("math"));
    }

    #[test]
    fn test_empty_fence() {
        let region = Region::fence(5, tokens(&["tex"]), "").unwrap();
        assert_eq!(region.range, LineRange::new(5, 6));
        assert_eq!(region.body(), Some(String::new()));
    }

    #[test]
    fn test_fence_explicit_height() {
        let region = Region::fence(1, tokens(&["gnuplot", "height=10"]), "plot x\n").unwrap();
        assert_eq!(region.range, LineRange::new(1, 10));
    }

    #[test]
    fn test_fence_bad_height_is_error() {
        let result = Region::fence(1, tokens(&["math", "height=abc"]), "x\n");
        assert!(matches!(result, Err(ParseError::InvalidHeight(_))));
    }

    #[test]
    fn test_file_region_range() {
        let region = Region::file(3, "fig.plt", 2, 1).unwrap();
        assert_eq!(region.range, LineRange::new(4, 5));
        assert_eq!(region.kind, RegionKind::File);
        assert_eq!(region.file_path.as_deref(), Some("fig.plt"));
        assert_eq!(region.content, None);
        assert_eq!(region.filetype(), None);
    }

    #[test]
    fn test_file_region_height_floor() {
        let region = Region::file(3, "fig.png", 0, 1).unwrap();
        assert_eq!(region.range, LineRange::new(4, 4));
    }

    #[test]
    fn test_file_region_empty_path() {
        assert!(Region::file(1, "  ", 2, 1).is_none());
    }

    #[test]
    fn test_resolve_relative_path() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("plot.plt"), b"plot x").unwrap();

        let region = Region::file(1, "plot.plt", 1, 1).unwrap();
        let resolved = region.resolve_file(Some(temp_dir.path())).unwrap();

        assert_eq!(resolved, temp_dir.path().join("plot.plt"));
        assert!(resolved.exists());
    }

    #[test]
    fn test_resolve_absolute_path_ignores_base() {
        let temp_dir = TempDir::new().unwrap();
        let abs = temp_dir.path().join("image.png");
        let region = Region::file(1, &abs.to_string_lossy(), 1, 1).unwrap();

        let resolved = region.resolve_file(Some(Path::new("/elsewhere"))).unwrap();
        assert_eq!(resolved, abs);
    }

    #[test]
    fn test_resolve_home_relative() {
        let region = Region::file(1, "~/figures/a.tex", 1, 1).unwrap();
        let resolved = region.resolve_file(None).unwrap();
        if let Some(dirs) = directories::BaseDirs::new() {
            assert_eq!(resolved, dirs.home_dir().join("figures/a.tex"));
        }
    }

    #[test]
    fn test_line_range_helpers() {
        let range = LineRange::new(2, 4);
        assert_eq!(range.to_zero_based(), (1, 3));
        assert_eq!(range.to_string(), "2-4");
        assert_eq!(LineRange::new(5, 1), LineRange::new(5, 5));
    }

    #[test]
    fn test_spanning_saturates() {
        let range = LineRange::spanning(3, usize::MAX);
        assert_eq!(range, LineRange::new(3, usize::MAX));
        assert_eq!(LineRange::spanning(3, 0), LineRange::new(3, 3));
    }
}
