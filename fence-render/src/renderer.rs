//! Renderer adapters
//!
//! [`Renderer`] is the seam to the external LaTeX/gnuplot toolchain: each method
//! takes content (or a source file) plus a target location and either produces a
//! file or fails. [`CommandRenderer`] drives the usual command-line tools.

use fence_core::config::CommandConfig;
use fence_core::Config;
use std::fs;
use std::path::{self, Path, PathBuf};
use std::process::{Command, Stdio};

use crate::cache::VECTOR_EXT;
use crate::error::RenderError;

/// Type-specific render operations, all producing SVG (or LaTeX for gnuplot)
pub trait Renderer: Send + Sync {
    /// Render an equation body to an SVG at `target`
    fn equation(&self, content: &str, target: &Path, scale: f32) -> Result<PathBuf, RenderError>;

    /// Render a LaTeX fragment or full document to an SVG at `target`
    fn latex(&self, content: &str, target: &Path) -> Result<PathBuf, RenderError>;

    /// Render an existing `.tex` file to an SVG at `target`
    fn latex_file(&self, source: &Path, target: &Path) -> Result<PathBuf, RenderError>;

    /// Turn a gnuplot script into a standalone `.tex` file inside `work_dir`
    fn gnuplot_to_latex(&self, script: &str, work_dir: &Path) -> Result<PathBuf, RenderError>;

    /// Turn a gnuplot script file into a standalone `.tex` file inside `work_dir`
    fn gnuplot_file_to_latex(&self, source: &Path, work_dir: &Path)
        -> Result<PathBuf, RenderError>;
}

/// Renderer backed by `latex`, `dvisvgm` and `gnuplot` executables
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    commands: CommandConfig,
    scale: f32,
}

impl CommandRenderer {
    pub fn new(commands: CommandConfig) -> Self {
        Self {
            commands,
            scale: 1.0,
        }
    }

    /// Scale used for LaTeX documents (equations get theirs per call)
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.commands.clone()).with_scale(config.render.scale)
    }

    /// Compile `tex` with latex and convert the DVI to SVG at `target`
    ///
    /// Both tools run from the source's directory so relative `\input` and
    /// graphics paths resolve. Paths handed to them are absolute, since the
    /// caller's relative paths mean nothing from there.
    fn compile(&self, tex: &Path, target: &Path, scale: f32) -> Result<PathBuf, RenderError> {
        if !tex.exists() {
            return Err(RenderError::FileNotFound(tex.to_path_buf()));
        }

        let tex_abs = path::absolute(tex)?;
        let target_abs = path::absolute(target)?;
        let source_dir = parent_dir(&tex_abs);
        let out_dir = parent_dir(&target_abs);
        let stem = tex
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        run(
            &self.commands.latex,
            Command::new(&self.commands.latex)
                .arg("-interaction=nonstopmode")
                .arg("-halt-on-error")
                .arg(format!("-output-directory={}", out_dir.display()))
                .arg(&tex_abs)
                .current_dir(&source_dir),
        )?;

        let dvi = out_dir.join(format!("{stem}.dvi"));
        expect_output(&self.commands.latex, &dvi)?;

        run(
            &self.commands.dvisvgm,
            Command::new(&self.commands.dvisvgm)
                .arg("--no-fonts")
                .arg(format!("--scale={scale}"))
                .arg("-o")
                .arg(&target_abs)
                .arg(&dvi)
                .current_dir(&source_dir),
        )?;

        expect_output(&self.commands.dvisvgm, &target_abs)?;
        Ok(target.to_path_buf())
    }

    /// Write `document` next to `target` and compile it
    fn compile_source(&self, document: &str, target: &Path, scale: f32) -> Result<PathBuf, RenderError> {
        let tex = target.with_extension("tex");
        fs::write(&tex, document)?;
        self.compile(&tex, target, scale)
    }

    fn run_gnuplot(
        &self,
        script: &str,
        cwd: &Path,
        work_dir: &Path,
        stem: &str,
    ) -> Result<PathBuf, RenderError> {
        let tex = work_dir.join(format!("{stem}.tex"));
        let tex_abs = path::absolute(&tex)?;
        let script_path = path::absolute(work_dir.join(format!("{stem}.plt")))?;
        fs::write(&script_path, gnuplot_script(script, &tex_abs))?;

        run(
            &self.commands.gnuplot,
            Command::new(&self.commands.gnuplot)
                .arg(&script_path)
                .current_dir(cwd),
        )?;

        expect_output(&self.commands.gnuplot, &tex_abs)?;
        Ok(tex)
    }
}

impl Renderer for CommandRenderer {
    fn equation(&self, content: &str, target: &Path, scale: f32) -> Result<PathBuf, RenderError> {
        self.compile_source(&equation_document(content), target, scale)
    }

    fn latex(&self, content: &str, target: &Path) -> Result<PathBuf, RenderError> {
        self.compile_source(&latex_document(content), target, self.scale)
    }

    fn latex_file(&self, source: &Path, target: &Path) -> Result<PathBuf, RenderError> {
        self.compile(source, target, self.scale)
    }

    fn gnuplot_to_latex(&self, script: &str, work_dir: &Path) -> Result<PathBuf, RenderError> {
        self.run_gnuplot(script, work_dir, work_dir, "plot")
    }

    fn gnuplot_file_to_latex(
        &self,
        source: &Path,
        work_dir: &Path,
    ) -> Result<PathBuf, RenderError> {
        let script = fs::read_to_string(source).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RenderError::FileNotFound(source.to_path_buf()),
            _ => RenderError::Io(e),
        })?;
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "plot".to_string());

        self.run_gnuplot(&script, &parent_dir(source), work_dir, &stem)
    }
}

/// Wrap an equation body in a standalone document
pub fn equation_document(body: &str) -> String {
    format!(
        "\\documentclass[preview,border=1pt]{{standalone}}\n\
         \\usepackage{{amsmath,amssymb}}\n\
         \\begin{{document}}\n\
         \\begin{{align*}}\n{body}\n\\end{{align*}}\n\
         \\end{{document}}\n"
    )
}

/// Wrap a LaTeX fragment in a standalone document; full documents pass through
pub fn latex_document(content: &str) -> String {
    if content.contains("\\documentclass") {
        return content.to_string();
    }
    format!(
        "\\documentclass[preview,border=1pt]{{standalone}}\n\
         \\usepackage{{amsmath,amssymb,graphicx}}\n\
         \\begin{{document}}\n{content}\n\\end{{document}}\n"
    )
}

/// Prefix a gnuplot script so it writes a standalone epslatex figure to `tex`
fn gnuplot_script(script: &str, tex: &Path) -> String {
    let output = tex.to_string_lossy().replace('\'', "''");
    format!(
        "set terminal epslatex standalone color\n\
         set output '{output}'\n\
         {script}\n\
         set output\n"
    )
}

/// Path with the generated vector suffix substituted for the LaTeX one
pub fn vector_path(tex: &Path) -> PathBuf {
    tex.with_extension(VECTOR_EXT)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn run(tool: &str, command: &mut Command) -> Result<(), RenderError> {
    log::debug!("running {:?}", command);

    let output = command
        .stdin(Stdio::null())
        .output()
        .map_err(|source| RenderError::Spawn {
            tool: tool.to_string(),
            source,
        })?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = tail(&output.stderr);
    let message = if stderr.is_empty() {
        tail(&output.stdout)
    } else {
        stderr
    };

    Err(RenderError::Tool {
        tool: tool.to_string(),
        status: output.status.to_string(),
        message,
    })
}

fn expect_output(tool: &str, path: &Path) -> Result<(), RenderError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(RenderError::MissingOutput {
            tool: tool.to_string(),
            path: path.to_path_buf(),
        })
    }
}

/// Last few non-empty lines of tool output
fn tail(bytes: &[u8]) -> String {
    const LINES: usize = 5;
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(LINES)..].join("\n")
}
