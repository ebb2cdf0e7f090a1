//! Fence - Preview fenced math, LaTeX and gnuplot blocks as images

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fence_core::{Config, Delimiter, Region};
use fence_render::{Orchestrator, RenderStatus, RenderedRegion};
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "watch")]
mod watcher;

/// Render fenced math, LaTeX and gnuplot blocks to images
#[derive(Parser, Debug)]
#[command(name = "fence")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the regions found in a document
    Regions {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print JSON instead of one line per region
        #[arg(long)]
        json: bool,
    },

    /// Render every region of a document into the art directory
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print JSON instead of one line per region
        #[arg(long)]
        json: bool,

        /// Art directory (overrides the config)
        #[arg(long, value_name = "DIR")]
        art_dir: Option<PathBuf>,

        /// Concurrent render jobs (overrides the config)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Re-render a document whenever it is written
    #[cfg(feature = "watch")]
    Watch {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Quiet period after a write before re-rendering, in milliseconds
        #[arg(long, default_value_t = 250)]
        debounce: u64,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Regions { file, json } => regions(&config, &file, json),
        Command::Render {
            file,
            json,
            art_dir,
            jobs,
        } => {
            let mut config = config;
            if let Some(dir) = art_dir {
                config.cache.dir = dir;
            }
            if let Some(jobs) = jobs {
                config.render.workers = jobs.max(1);
            }
            render(&config, &file, json)
        }
        #[cfg(feature = "watch")]
        Command::Watch { file, debounce } => {
            watch(&config, &file, std::time::Duration::from_millis(debounce))
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return Config::load_from(path);
    }

    let (config, diagnostics) = Config::load().context("Failed to load configuration")?;
    for diagnostic in &diagnostics {
        diagnostic.log();
    }
    Ok(config)
}

/// Read a document as editor-style buffer lines
fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;
    Ok(content.lines().map(str::to_string).collect())
}

fn delimiter(config: &Config) -> Delimiter {
    Delimiter::new().with_min_file_height(config.render.min_file_height)
}

/// Orchestrator resolving file references next to the document
fn orchestrator(config: &Config, file: &Path) -> Orchestrator {
    let orchestrator = Orchestrator::from_config(config);
    match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => orchestrator.with_base_dir(dir),
        _ => orchestrator,
    }
}

fn regions(config: &Config, file: &Path, json: bool) -> Result<()> {
    let delimited = delimiter(config).delimit(&read_lines(file)?);
    for error in &delimited.errors {
        eprintln!("{}", error.diagnostic());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&delimited.regions)?);
    } else {
        for region in &delimited.regions {
            println!("{}", format_region(region));
        }
    }
    Ok(())
}

fn render(config: &Config, file: &Path, json: bool) -> Result<()> {
    let lines = read_lines(file)?;
    let delimited = delimiter(config).delimit(&lines);
    for error in &delimited.errors {
        eprintln!("{}", error.diagnostic());
    }

    let batch = orchestrator(config, file).render_all(delimited.regions);
    print_results(&batch.results, json)
}

#[cfg(feature = "watch")]
fn watch(config: &Config, file: &Path, debounce: std::time::Duration) -> Result<()> {
    use fence_render::{RenderRequest, RenderWorker};
    use std::time::Duration;

    let mut watcher = watcher::DocumentWatcher::new(file)?;
    let worker = RenderWorker::spawn(orchestrator(config, watcher.path()), delimiter(config));
    let mut draw_number = 1;

    worker.request(RenderRequest {
        buffer: 0,
        draw_number,
        lines: read_lines(watcher.path())?,
    });
    eprintln!("Watching {}", watcher.path().display());

    loop {
        if watcher.check_changed(debounce) {
            match read_lines(watcher.path()) {
                Ok(lines) => {
                    draw_number += 1;
                    worker.request(RenderRequest {
                        buffer: 0,
                        draw_number,
                        lines,
                    });
                }
                // Saved by rename; the next event brings the new file
                Err(e) => log::debug!("{:#}", e),
            }
        }

        if let Some(update) = worker.recv_update_timeout(Duration::from_millis(100)) {
            if update.is_stale(draw_number) {
                continue;
            }
            for diagnostic in &update.diagnostics {
                eprintln!("{}", diagnostic);
            }
            if update.clear {
                println!("-- draw {}", update.draw_number);
                print_results(&update.results, false)?;
            }
        }
    }
}

fn print_results(results: &[RenderedRegion], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
    } else {
        for result in results {
            println!("{}", format_result(result));
        }
    }
    Ok(())
}

/// `start-end<TAB>kind<TAB>identity<TAB>detail`
fn format_region(region: &Region) -> String {
    let kind = match &region.file_path {
        Some(_) => "file",
        None => region.filetype().unwrap_or("-"),
    };
    let detail = match &region.file_path {
        Some(path) => path.clone(),
        None => region.declared_params.join(","),
    };
    let short_id = region.identity.get(..12).unwrap_or(&region.identity);
    format!("{}\t{}\t{}\t{}", region.range, kind, short_id, detail)
}

/// `start-end<TAB>status<TAB>artifact`
fn format_result(result: &RenderedRegion) -> String {
    let status = match &result.status {
        RenderStatus::Cached => "cached".to_string(),
        RenderStatus::Rendered => "rendered".to_string(),
        RenderStatus::PassThrough => "passthrough".to_string(),
        RenderStatus::Skipped => "skipped".to_string(),
        RenderStatus::FileNotFound(path) => format!("not found: {}", path.display()),
        RenderStatus::Failed(message) => {
            format!("failed: {}", message.lines().next().unwrap_or_default())
        }
    };
    let artifact = result
        .artifact
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{}\t{}\t{}", result.range(), status, artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use fence_core::delimit;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render_args() {
        let cli = Cli::parse_from(["fence", "render", "doc.md", "--jobs", "3", "--json"]);
        match cli.command {
            Command::Render {
                file, json, jobs, art_dir,
            } => {
                assert_eq!(file, PathBuf::from("doc.md"));
                assert!(json);
                assert_eq!(jobs, Some(3));
                assert_eq!(art_dir, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_read_lines_like_buffer() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("doc.md");
        fs::write(&file, "```math\nx\n```\n").unwrap();

        assert_eq!(read_lines(&file).unwrap(), vec!["```math", "x", "```"]);
        assert!(read_lines(&dir.path().join("missing.md")).is_err());
    }

    #[test]
    fn test_format_region() {
        let regions = delimit(&["```math,height=3", "x", "```", "![plot](fig.plt)", ""]);

        let fence = format_region(&regions[0]);
        assert!(fence.starts_with("1-3\tmath\t"));
        assert!(fence.ends_with("\tmath,height=3"));

        let file = format_region(&regions[1]);
        assert!(file.starts_with("5-5\tfile\t"));
        assert!(file.ends_with("\tfig.plt"));
    }

    #[test]
    fn test_format_result() {
        let region = delimit(&["![p](p.png)", ""]).remove(0);
        let missing = RenderedRegion {
            region: region.clone(),
            artifact: None,
            status: RenderStatus::FileNotFound(PathBuf::from("/doc/p.png")),
        };
        assert_eq!(format_result(&missing), "2-2\tnot found: /doc/p.png\t-");

        let shown = RenderedRegion {
            region,
            artifact: Some(PathBuf::from("/doc/p.png")),
            status: RenderStatus::PassThrough,
        };
        assert_eq!(format_result(&shown), "2-2\tpassthrough\t/doc/p.png");
    }
}
