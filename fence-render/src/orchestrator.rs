//! Render orchestration
//!
//! One batch per parse: check the change detector, resolve every region against
//! the cache, render the misses concurrently (one job per distinct identity),
//! rasterize vector output, and hand back results in region order.

use fence_core::{Config, Diagnostic, LineRange, Region, RegionKind};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use crate::cache::{RenderCache, RASTER_EXT, VECTOR_EXT};
use crate::change::ChangeDetector;
use crate::error::RenderError;
use crate::pool::WorkerPool;
use crate::raster::{default_rasterizer, is_raster, is_vector, Rasterizer};
use crate::renderer::{vector_path, CommandRenderer, Renderer};

/// What happened to a region in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    /// Artifact was already in the cache
    Cached,
    /// Artifact produced by this batch
    Rendered,
    /// Referenced file is already a displayable bitmap
    PassThrough,
    /// Unsupported kind or file suffix; nothing to show
    Skipped,
    /// Referenced file does not exist
    FileNotFound(PathBuf),
    /// Rendering or rasterization failed
    Failed(String),
}

/// A region paired with its artifact, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedRegion {
    pub region: Region,
    pub artifact: Option<PathBuf>,
    pub status: RenderStatus,
}

impl RenderedRegion {
    pub fn range(&self) -> LineRange {
        self.region.range
    }

    /// Diagnostic for failure statuses, `None` otherwise
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        let diagnostic = match &self.status {
            RenderStatus::FileNotFound(path) => {
                Diagnostic::warning(format!("File not found: {}", path.display()), "render")
            }
            RenderStatus::Failed(message) => Diagnostic::error(message.clone(), "render"),
            _ => return None,
        };
        Some(diagnostic.at(self.region.range))
    }
}

/// Result set of one `render_all` call
#[derive(Debug, Clone)]
pub struct Batch {
    /// One entry per input region, in input order
    pub results: Vec<RenderedRegion>,
    /// True when the change detector short-circuited the batch
    pub unchanged: bool,
}

impl Batch {
    /// `(range, artifact)` pairs for the display layer
    pub fn artifacts(&self) -> impl Iterator<Item = (LineRange, &Path)> {
        self.results
            .iter()
            .filter_map(|r| r.artifact.as_deref().map(|path| (r.region.range, path)))
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.results.iter().filter_map(|r| r.diagnostic()).collect()
    }
}

/// Decision for a region before any rendering happens
enum Plan {
    Done(Option<PathBuf>, RenderStatus),
    Render(Job),
}

#[derive(Debug, Clone)]
struct Job {
    identity: String,
    task: Task,
}

#[derive(Debug, Clone)]
enum Task {
    Equation(String),
    Latex(String),
    Gnuplot(String),
    LatexFile(PathBuf),
    GnuplotFile(PathBuf),
    Rasterize(PathBuf),
}

/// Drives regions through cache, renderers and rasterizer
pub struct Orchestrator {
    cache: RenderCache,
    renderer: Box<dyn Renderer>,
    rasterizer: Box<dyn Rasterizer>,
    pool: WorkerPool,
    scale: f32,
    dpi: f32,
    base_dir: Option<PathBuf>,
    detector: ChangeDetector,
}

impl Orchestrator {
    pub fn new(
        cache: RenderCache,
        renderer: Box<dyn Renderer>,
        rasterizer: Box<dyn Rasterizer>,
    ) -> Self {
        Self {
            cache,
            renderer,
            rasterizer,
            pool: WorkerPool::default(),
            scale: 1.0,
            dpi: 600.0,
            base_dir: None,
            detector: ChangeDetector::new(),
        }
    }

    /// Orchestrator with the command-line renderer and default rasterizer
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            RenderCache::new(&config.cache.dir),
            Box::new(CommandRenderer::from_config(config)),
            default_rasterizer(),
        )
        .with_workers(config.render.workers)
        .with_scale(config.render.scale)
        .with_dpi(config.render.dpi)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.pool = WorkerPool::new(workers);
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_dpi(mut self, dpi: f32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Directory relative file references resolve against
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// Render a parse result, reusing the previous delivery if nothing changed
    pub fn render_all(&mut self, regions: Vec<Region>) -> Batch {
        let mut detector = std::mem::take(&mut self.detector);
        let batch = self.render_tracked(&mut detector, regions);
        self.detector = detector;
        batch
    }

    /// Like [`Orchestrator::render_all`] with caller-owned change state
    ///
    /// Lets one orchestrator serve several buffers, each with its own detector.
    pub fn render_tracked(&self, detector: &mut ChangeDetector, regions: Vec<Region>) -> Batch {
        if let Some(previous) = detector.unchanged(&regions) {
            log::debug!("regions unchanged, reusing {} results", previous.len());
            return Batch {
                results: previous.to_vec(),
                unchanged: true,
            };
        }

        let results = self.render_batch(&regions);
        detector.record(regions, results.clone());

        Batch {
            results,
            unchanged: false,
        }
    }

    /// Render a batch without consulting the change detector
    pub fn render_batch(&self, regions: &[Region]) -> Vec<RenderedRegion> {
        let plans: Vec<Plan> = regions.iter().map(|region| self.plan(region)).collect();

        let mut seen = HashSet::new();
        let jobs: Vec<Job> = plans
            .iter()
            .filter_map(|plan| match plan {
                Plan::Render(job) if seen.insert(job.identity.clone()) => Some(job.clone()),
                _ => None,
            })
            .collect();

        if !jobs.is_empty() {
            log::info!(
                "rendering {} of {} regions on {} workers",
                jobs.len(),
                regions.len(),
                self.pool.workers()
            );
        }

        let identities: Vec<String> = jobs.iter().map(|job| job.identity.clone()).collect();
        let outcomes = self
            .pool
            .scatter_gather(jobs, |job| self.execute(job));
        let rendered: HashMap<String, (Option<PathBuf>, RenderStatus)> =
            identities.into_iter().zip(outcomes).collect();

        regions
            .iter()
            .zip(plans)
            .map(|(region, plan)| {
                let (artifact, status) = match plan {
                    Plan::Done(artifact, status) => (artifact, status),
                    Plan::Render(job) => rendered.get(&job.identity).cloned().unwrap_or((
                        None,
                        RenderStatus::Failed("render result missing".to_string()),
                    )),
                };
                let result = RenderedRegion {
                    region: region.clone(),
                    artifact,
                    status,
                };
                if let Some(diagnostic) = result.diagnostic() {
                    diagnostic.log();
                }
                result
            })
            .collect()
    }

    fn plan(&self, region: &Region) -> Plan {
        let identity = region.identity.clone();
        let body = || region.body().unwrap_or_default();

        let task = match &region.kind {
            RegionKind::Other(tag) => {
                log::debug!("no renderer for `{}` at lines {}", tag, region.range);
                return Plan::Done(None, RenderStatus::Skipped);
            }
            RegionKind::File => return self.plan_file(region),
            RegionKind::Math => Task::Equation(body()),
            RegionKind::Tex => Task::Latex(body()),
            RegionKind::Gnuplot => Task::Gnuplot(body()),
        };

        match self.cache.lookup(&identity) {
            Some(artifact) => Plan::Done(Some(artifact), RenderStatus::Cached),
            None => Plan::Render(Job { identity, task }),
        }
    }

    fn plan_file(&self, region: &Region) -> Plan {
        let Some(source) = region.resolve_file(self.base_dir.as_deref()) else {
            return Plan::Done(None, RenderStatus::Skipped);
        };

        let suffix = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let task = match suffix.as_str() {
            "tex" => Task::LatexFile(source.clone()),
            "plt" => Task::GnuplotFile(source.clone()),
            _ if is_vector(&source) => Task::Rasterize(source.clone()),
            _ if !source.exists() => {
                return Plan::Done(None, RenderStatus::FileNotFound(source));
            }
            _ if is_raster(&source) => {
                return Plan::Done(Some(source), RenderStatus::PassThrough);
            }
            _ => {
                log::debug!("unsupported file type: {}", source.display());
                return Plan::Done(None, RenderStatus::Skipped);
            }
        };

        // A stale artifact must not hide a deleted source
        if !source.exists() {
            return Plan::Done(None, RenderStatus::FileNotFound(source));
        }
        let artifact = self.cache.resolve(&region.identity, RASTER_EXT);
        if self.cache.exists(&artifact) && RenderCache::is_fresh(&artifact, &source) {
            return Plan::Done(Some(artifact), RenderStatus::Cached);
        }

        Plan::Render(Job {
            identity: region.identity.clone(),
            task,
        })
    }

    /// Run one job, converting every failure (panics included) into a status
    fn execute(&self, job: Job) -> (Option<PathBuf>, RenderStatus) {
        let identity = job.identity.clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.render_job(job)))
            .unwrap_or_else(|payload| Err(RenderError::Panicked(panic_message(payload.as_ref()))));

        match outcome {
            Ok(artifact) => {
                log::debug!("rendered {} -> {}", identity, artifact.display());
                (Some(artifact), RenderStatus::Rendered)
            }
            Err(RenderError::FileNotFound(path)) => (None, RenderStatus::FileNotFound(path)),
            Err(e) => (None, RenderStatus::Failed(e.to_string())),
        }
    }

    fn render_job(&self, job: Job) -> Result<PathBuf, RenderError> {
        let scratch = self.cache.scratch()?;
        let target = scratch.path().join(format!("{}.{}", job.identity, VECTOR_EXT));
        let renderer = self.renderer.as_ref();

        let output = match job.task {
            Task::Equation(body) => renderer.equation(&body, &target, self.scale)?,
            Task::Latex(body) => renderer.latex(&body, &target)?,
            Task::Gnuplot(script) => {
                let tex = renderer.gnuplot_to_latex(&script, scratch.path())?;
                renderer.latex_file(&tex, &vector_path(&tex))?
            }
            Task::LatexFile(source) => renderer.latex_file(&source, &target)?,
            Task::GnuplotFile(source) => {
                let tex = renderer.gnuplot_file_to_latex(&source, scratch.path())?;
                renderer.latex_file(&tex, &vector_path(&tex))?
            }
            Task::Rasterize(source) => {
                if !source.exists() {
                    return Err(RenderError::FileNotFound(source));
                }
                source
            }
        };

        if !output.is_file() {
            return Err(RenderError::MissingOutput {
                tool: "renderer".to_string(),
                path: output,
            });
        }

        let png = if is_vector(&output) {
            self.rasterizer.rasterize(&output, self.dpi)?
        } else if is_raster(&output) {
            fs::read(&output)?
        } else {
            return Err(RenderError::Rasterize(format!(
                "unsupported renderer output: {}",
                output.display()
            )));
        };

        // Keep the vector intermediate next to the bitmap
        if is_vector(&output) && output.starts_with(scratch.path()) {
            if let Err(e) = self.cache.commit(&output, &job.identity, VECTOR_EXT) {
                log::warn!("failed to keep {}: {}", output.display(), e);
            }
        }

        Ok(self.cache.store(&job.identity, RASTER_EXT, &png)?)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
