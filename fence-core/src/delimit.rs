//! Region extraction from raw buffer text
//!
//! The buffer is joined with `\n` and prefixed with one extra `\n`, so both
//! patterns can anchor on "newline right before the marker" even on the first
//! line. Match offsets are mapped back to line numbers through a sorted table
//! of newline positions built once per parse.

use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::LazyLock;

use crate::diagnostic::Diagnostic;
use crate::params::{split_params, ParseError};
use crate::region::{LineRange, Region, RegionKind};

/// Marker line with a type tag and optional parameters, then a lazily matched body
const FENCE_PATTERN: &str = r"\n```(?P<params>[A-Za-z][^\n`]*)\n(?P<inner>(?s:.*?))```";

/// Standalone `![alt](path)` line followed by any number of blank lines
const FILE_PATTERN: &str =
    r"\n!\[(?P<alt>[^\]\n]*)\]\((?P<path>[^)\n]*)\)[ \t]*(?m:$)(?P<trailing>\n*)";

/// Smallest area reserved below a file reference
pub const DEFAULT_MIN_FILE_HEIGHT: usize = 1;

static DEFAULT_DELIMITER: LazyLock<Delimiter> = LazyLock::new(Delimiter::new);

/// A region whose parameters failed to parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitError {
    /// Line of the fence marker
    pub line: usize,
    pub error: ParseError,
}

impl DelimitError {
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.error.to_string(), "delimit").at(LineRange::new(self.line, self.line))
    }
}

/// Output of one parse pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delimited {
    /// Regions sorted by start line
    pub regions: Vec<Region>,
    /// Regions dropped because of malformed parameters
    pub errors: Vec<DelimitError>,
}

/// Compiled region patterns
#[derive(Debug, Clone)]
pub struct Delimiter {
    fences: Regex,
    files: Regex,
    min_file_height: usize,
}

impl Delimiter {
    pub fn new() -> Self {
        Self {
            fences: Regex::new(FENCE_PATTERN).expect("fence pattern compiles"),
            files: Regex::new(FILE_PATTERN).expect("file pattern compiles"),
            min_file_height: DEFAULT_MIN_FILE_HEIGHT,
        }
    }

    /// Override the minimum height reserved below file references
    pub fn with_min_file_height(mut self, height: usize) -> Self {
        self.min_file_height = height.max(1);
        self
    }

    /// Extract all regions from a buffer snapshot
    pub fn delimit<S: AsRef<str>>(&self, buffer_lines: &[S]) -> Delimited {
        let text = join_buffer(buffer_lines);
        let index = LineIndex::new(&text);

        let mut delimited = Delimited::default();
        let mut fence_spans = Vec::new();

        for caps in self.fences.captures_iter(&text) {
            let Some(whole) = caps.get(0) else { continue };
            fence_spans.push(whole.range());

            let line = index.line_at(whole.start());
            match fence_region(&caps, line) {
                Ok(region) => delimited.regions.push(region),
                Err(error) => delimited.errors.push(DelimitError { line, error }),
            }
        }

        let mut at = 0;
        while let Some(caps) = self.files.captures_at(&text, at) {
            let (Some(whole), Some(trailing)) = (caps.get(0), caps.name("trailing")) else {
                break;
            };
            // Resume on the newline ending the reference, so a reference on the
            // very next line still finds its leading newline.
            at = trailing.start().max(whole.start() + 1);

            if inside_any(&fence_spans, whole.start()) {
                continue;
            }

            let newlines = trailing.as_str().len();
            let unterminated_last = whole.end() == text.len() && newlines > 0;
            let blank_lines = newlines.saturating_sub(1) + usize::from(unterminated_last);

            let path = caps.name("path").map_or("", |m| m.as_str());
            let line = index.line_at(whole.start());
            if let Some(region) = Region::file(line, path, blank_lines, self.min_file_height) {
                delimited.regions.push(region);
            }
        }

        delimited.regions.sort_by_key(|r| r.range.start);
        delimited.regions = resolve_overlaps(std::mem::take(&mut delimited.regions));
        delimited
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Delimit with the default patterns, logging dropped regions
pub fn delimit<S: AsRef<str>>(buffer_lines: &[S]) -> Vec<Region> {
    let delimited = DEFAULT_DELIMITER.delimit(buffer_lines);
    for error in &delimited.errors {
        log::warn!("{}", error.diagnostic());
    }
    delimited.regions
}

fn fence_region(caps: &Captures<'_>, line: usize) -> Result<Region, ParseError> {
    let params = caps.name("params").map_or("", |m| m.as_str().trim_end());
    let body = caps.name("inner").map_or("", |m| m.as_str());
    Region::fence(line, split_params(params), body)
}

/// Trim reserved areas so no two regions share a line
///
/// Expects regions sorted by start line. A region running into the next one
/// ends on the line before it. When two regions start on the same line the
/// fence keeps it and the file reference has no room left, so it is dropped.
fn resolve_overlaps(sorted: Vec<Region>) -> Vec<Region> {
    let mut kept: Vec<Region> = Vec::with_capacity(sorted.len());

    for region in sorted {
        if let Some(prev) = kept.last_mut() {
            if region.range.start <= prev.range.end {
                if region.range.start > prev.range.start {
                    prev.range = LineRange::new(prev.range.start, region.range.start - 1);
                } else if region.kind == RegionKind::File {
                    log::debug!("no room below file reference at line {}", region.range.start);
                    continue;
                } else {
                    log::debug!("no room below file reference at line {}", prev.range.start);
                    *prev = region;
                    continue;
                }
            }
        }
        kept.push(region);
    }

    kept
}

fn inside_any(spans: &[Range<usize>], offset: usize) -> bool {
    spans.iter().any(|span| span.contains(&offset))
}

fn join_buffer<S: AsRef<str>>(buffer_lines: &[S]) -> String {
    let capacity = buffer_lines.iter().map(|l| l.as_ref().len() + 1).sum::<usize>() + 1;
    let mut text = String::with_capacity(capacity);
    text.push('\n');
    for (i, line) in buffer_lines.iter().enumerate() {
        if i > 0 {
            text.push('\n');
        }
        text.push_str(line.as_ref());
    }
    text
}

/// Sorted byte offsets of every newline in the joined text
struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let newlines = text
            .bytes()
            .enumerate()
            .filter_map(|(i, b)| (b == b'\n').then_some(i))
            .collect();
        Self { newlines }
    }

    /// 1-based line of an offset: the number of newlines at or before it
    ///
    /// The synthetic leading newline makes the newline preceding buffer line `k`
    /// the `k`-th newline, so a match starting on it lands on line `k`.
    fn line_at(&self, offset: usize) -> usize {
        self.newlines.partition_point(|&p| p <= offset).max(1)
    }
}
