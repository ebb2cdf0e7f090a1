//! Content-addressed artifact cache
//!
//! The art directory is the cache: an artifact named `<identity>.<ext>`
//! existing means the content was already rendered. There is no index file
//! and no eviction. Writers stage into a temporary file inside the directory
//! and rename it into place, so an existence check never sees a partial file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

/// Extension of final, displayable artifacts
pub const RASTER_EXT: &str = "png";
/// Extension of vector intermediates
pub const VECTOR_EXT: &str = "svg";

/// Filesystem-backed mapping from identity to artifact path
#[derive(Debug, Clone)]
pub struct RenderCache {
    dir: PathBuf,
}

impl RenderCache {
    /// Create a cache rooted at `dir` (created lazily on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Art directory root
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the art directory if absent
    pub fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// Expected artifact path for an identity; no I/O
    pub fn resolve(&self, identity: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{identity}.{ext}"))
    }

    /// Whether an artifact exists at `path`
    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Final raster artifact for an identity, if already rendered
    pub fn lookup(&self, identity: &str) -> Option<PathBuf> {
        let path = self.resolve(identity, RASTER_EXT);
        self.exists(&path).then_some(path)
    }

    /// Atomically write `bytes` as `<identity>.<ext>`
    ///
    /// Concurrent writers of the same identity are harmless: the last rename wins
    /// and both wrote identical content.
    pub fn store(&self, identity: &str, ext: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        self.ensure_dir()?;
        let target = self.resolve(identity, ext);

        let mut staged = NamedTempFile::new_in(&self.dir)?;
        staged.write_all(bytes)?;
        staged.flush()?;
        staged.persist(&target).map_err(|e| e.error)?;

        Ok(target)
    }

    /// Move an already written file into the cache as `<identity>.<ext>`
    ///
    /// `staged` should live inside the art directory (see [`RenderCache::scratch`])
    /// so the move is a plain rename; otherwise the bytes are copied atomically.
    pub fn commit(&self, staged: &Path, identity: &str, ext: &str) -> io::Result<PathBuf> {
        self.ensure_dir()?;
        let target = self.resolve(identity, ext);

        match fs::rename(staged, &target) {
            Ok(()) => Ok(target),
            Err(_) => {
                let bytes = fs::read(staged)?;
                self.store(identity, ext, &bytes)
            }
        }
    }

    /// Temporary working directory inside the art directory, removed on drop
    pub fn scratch(&self) -> io::Result<TempDir> {
        self.ensure_dir()?;
        tempfile::Builder::new()
            .prefix(".scratch-")
            .tempdir_in(&self.dir)
    }

    /// Artifacts currently in the cache (the directory listing is the index)
    pub fn entries(&self) -> io::Result<Vec<PathBuf>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if path.is_file() && !hidden {
                entries.push(path);
            }
        }
        entries.sort();
        Ok(entries)
    }

    /// Whether an artifact is at least as new as the source it was made from
    ///
    /// Nothing is fresh unless both files exist and report modification times.
    pub fn is_fresh(artifact: &Path, source: &Path) -> bool {
        let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
        match (modified(artifact), modified(source)) {
            (Some(artifact), Some(source)) => artifact >= source,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn test_resolve_is_pure() {
        let cache = RenderCache::new("/nonexistent/art");
        let path = cache.resolve("abc123", "png");
        assert_eq!(path, PathBuf::from("/nonexistent/art/abc123.png"));
        assert!(!cache.exists(&path));
        assert!(!Path::new("/nonexistent/art").exists());
    }

    #[test]
    fn test_store_creates_dir_and_file() {
        let temp_dir = TempDir::new().unwrap();
        let cache = RenderCache::new(temp_dir.path().join("art"));

        let path = cache.store("deadbeef", RASTER_EXT, b"png bytes").unwrap();
        assert_eq!(path, cache.resolve("deadbeef", RASTER_EXT));
        assert_eq!(fs::read(&path).unwrap(), b"png bytes");
        assert_eq!(cache.lookup("deadbeef"), Some(path));
    }

    #[test]
    fn test_store_overwrites_idempotently() {
        let temp_dir = TempDir::new().unwrap();
        let cache = RenderCache::new(temp_dir.path());

        cache.store("id", RASTER_EXT, b"same").unwrap();
        cache.store("id", RASTER_EXT, b"same").unwrap();

        assert_eq!(cache.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_artifact_is_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = RenderCache::new(temp_dir.path());

        let path = cache.store("gone", RASTER_EXT, b"x").unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(cache.lookup("gone"), None);
    }

    #[test]
    fn test_commit_moves_scratch_file() {
        let temp_dir = TempDir::new().unwrap();
        let cache = RenderCache::new(temp_dir.path());

        let scratch = cache.scratch().unwrap();
        let staged = scratch.path().join("out.svg");
        fs::write(&staged, b"<svg/>").unwrap();

        let path = cache.commit(&staged, "vec", VECTOR_EXT).unwrap();
        assert_eq!(path, cache.resolve("vec", VECTOR_EXT));
        assert!(!staged.exists());
        assert_eq!(fs::read(&path).unwrap(), b"<svg/>");
    }

    #[test]
    fn test_entries_skip_scratch_and_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let cache = RenderCache::new(temp_dir.path());

        cache.store("a", RASTER_EXT, b"a").unwrap();
        cache.store("b", VECTOR_EXT, b"b").unwrap();
        let _scratch = cache.scratch().unwrap();
        fs::write(temp_dir.path().join(".tmpPartial"), b"partial").unwrap();

        let entries = cache.entries().unwrap();
        assert_eq!(
            entries,
            vec![cache.resolve("a", RASTER_EXT), cache.resolve("b", VECTOR_EXT)]
        );
    }

    #[test]
    fn test_entries_of_missing_dir() {
        let cache = RenderCache::new("/nonexistent/fence/art");
        assert!(cache.entries().unwrap().is_empty());
    }

    #[test]
    fn test_freshness() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("plot.plt");
        let artifact = temp_dir.path().join("plot.png");
        fs::write(&source, b"plot x").unwrap();
        fs::write(&artifact, b"png").unwrap();

        let earlier = SystemTime::now() - Duration::from_secs(3600);
        let file = fs::File::options().write(true).open(&artifact).unwrap();
        file.set_modified(earlier).unwrap();

        assert!(!RenderCache::is_fresh(&artifact, &source));
        assert!(RenderCache::is_fresh(&source, &artifact));
        assert!(!RenderCache::is_fresh(&artifact, &temp_dir.path().join("missing")));
        assert!(!RenderCache::is_fresh(&temp_dir.path().join("missing"), &source));
    }
}
