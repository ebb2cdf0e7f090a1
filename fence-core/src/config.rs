//! Configuration management for fence

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::delimit::DEFAULT_MIN_FILE_HEIGHT;
use crate::diagnostic::Diagnostic;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub render: RenderConfig,
    pub commands: CommandConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Art directory holding `<identity>.<ext>` artifacts
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Render worker threads
    pub workers: usize,
    /// Scale factor handed to equation and LaTeX renderers
    pub scale: f32,
    /// Rasterization resolution
    pub dpi: f32,
    /// Minimum lines reserved below a file reference
    pub min_file_height: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub latex: String,
    pub dvisvgm: String,
    pub gnuplot: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_art_dir(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            scale: 1.0,
            dpi: 600.0,
            min_file_height: DEFAULT_MIN_FILE_HEIGHT,
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            latex: "latex".to_string(),
            dvisvgm: "dvisvgm".to_string(),
            gnuplot: "gnuplot".to_string(),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_art_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "fence")
        .map(|dirs| dirs.cache_dir().join("art"))
        .unwrap_or_else(|| std::env::temp_dir().join("fence-art"))
}

impl Config {
    /// Get the platform-specific config file path
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "fence")
            .map(|proj_dirs| proj_dirs.config_dir().join("fence.toml"))
    }

    /// Load configuration from the platform path, falling back to defaults if missing
    ///
    /// Returns the config together with diagnostics about adjusted settings.
    pub fn load() -> Result<(Self, Vec<Diagnostic>)> {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                let mut config = Self::read(&path)?;
                let mut diagnostics = config.normalize();
                diagnostics.insert(
                    0,
                    Diagnostic::info(format!("Loaded {}", path.display()), "config"),
                );
                return Ok((config, diagnostics));
            }
        }

        let mut config = Self::default();
        let diagnostics = config.normalize();
        Ok((config, diagnostics))
    }

    /// Load from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read(path)?;
        for diagnostic in config.normalize() {
            diagnostic.log();
        }
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        // The config names commands that get executed, so refuse shared-writable files
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = std::fs::metadata(path)
                .with_context(|| format!("Failed to stat config file: {}", path.display()))?;
            if metadata.permissions().mode() & 0o002 != 0 {
                anyhow::bail!(
                    "Config file {} is world-writable (insecure permissions)",
                    path.display()
                );
            }
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Replace out-of-range values with defaults
    pub fn normalize(&mut self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let defaults = RenderConfig::default();

        if self.render.workers == 0 {
            self.render.workers = defaults.workers;
            diagnostics.push(Diagnostic::warning(
                format!("render.workers must be positive, using {}", defaults.workers),
                "config",
            ));
        }
        if self.render.scale.is_nan() || self.render.scale <= 0.0 {
            self.render.scale = defaults.scale;
            diagnostics.push(Diagnostic::warning(
                "render.scale must be positive, using 1.0",
                "config",
            ));
        }
        if self.render.dpi.is_nan() || self.render.dpi <= 0.0 {
            self.render.dpi = defaults.dpi;
            diagnostics.push(Diagnostic::warning(
                "render.dpi must be positive, using 600",
                "config",
            ));
        }
        if self.render.min_file_height == 0 {
            self.render.min_file_height = DEFAULT_MIN_FILE_HEIGHT;
            diagnostics.push(Diagnostic::warning(
                "render.min_file_height must be at least 1",
                "config",
            ));
        }

        diagnostics
    }
}
