use anyhow::{anyhow, bail, Context, Result};
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Pattern used when none is given.
pub const DEFAULT_PATTERN: &str = "*.wav";

/// Recursively finds files whose name matches a glob pattern.
///
/// Symbolic links are followed. Only the file name is matched against the
/// pattern, so `*.wav` finds wav files at any depth. Entries are visited in
/// file-name order within each directory, so results are deterministic.
///
/// # Example
/// ```ignore
/// // Absolute-or-as-given paths: "corpus/spk1/a.wav", ...
/// let wavs = FileFinder::new("corpus").pattern("*.wav").find()?;
///
/// // Paths relative to the root: "spk1/a.wav", ...
/// let relative = FileFinder::new("corpus").use_dir_name(false).find()?;
///
/// // Lazily, e.g. to feed a Prefetcher
/// let paths = FileFinder::new("corpus").iter()?.try_prefetch(8)?;
/// ```
#[derive(Debug, Clone)]
pub struct FileFinder {
    root: PathBuf,
    pattern: String,
    use_dir_name: bool,
}

impl FileFinder {
    /// Creates a finder rooted at `root` with the default `*.wav` pattern.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            use_dir_name: true,
        }
    }

    /// Sets the file-name pattern (`*`, `?`, `[abc]`, `[!abc]`).
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// If `true` (default), results are `root` joined with the relative path.
    /// If `false`, results are relative to `root`.
    pub fn use_dir_name(mut self, use_dir_name: bool) -> Self {
        self.use_dir_name = use_dir_name;
        self
    }

    /// Returns a lazy iterator over matching file paths.
    ///
    /// Fails up front if the root is not a directory or the pattern is invalid;
    /// entries that cannot be read are yielded as errors.
    pub fn iter(&self) -> Result<Box<dyn Iterator<Item = Result<PathBuf>> + Send>> {
        // Early validation: ensure the root exists and is a directory.
        let root_metadata = fs::metadata(&self.root)
            .with_context(|| format!("Failed to access directory: {}", self.root.display()))?;
        if !root_metadata.is_dir() {
            bail!("Path is not a directory: {}", self.root.display());
        }

        let pattern = Pattern::new(&self.pattern)
            .map_err(|e| anyhow!("Invalid file pattern '{}': {}", self.pattern, e))?;
        let root = self.root.clone();
        let use_dir_name = self.use_dir_name;

        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();

        let iter = walker.filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(anyhow!("Failed to read directory entry: {}", e))),
            };
            // With follow_links, file_type() describes the link target.
            if !entry.file_type().is_file() {
                return None;
            }
            let name_matches = entry
                .file_name()
                .to_str()
                .map_or(false, |name| pattern.matches(name));
            if !name_matches {
                return None;
            }
            Some(output_path(&root, entry.path(), use_dir_name))
        });
        Ok(Box::new(iter))
    }

    /// Collects all matching paths, failing on the first unreadable entry.
    pub fn find(&self) -> Result<Vec<PathBuf>> {
        self.iter()?.collect()
    }
}

/// Shorthand for `FileFinder::new(root).pattern(pattern).use_dir_name(use_dir_name).find()`.
pub fn find_files(
    root: impl AsRef<Path>,
    pattern: &str,
    use_dir_name: bool,
) -> Result<Vec<PathBuf>> {
    FileFinder::new(root.as_ref())
        .pattern(pattern)
        .use_dir_name(use_dir_name)
        .find()
}

fn output_path(root: &Path, path: &Path, use_dir_name: bool) -> Result<PathBuf> {
    if use_dir_name {
        return Ok(path.to_path_buf());
    }
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .with_context(|| format!("{} is not below {}", path.display(), root.display()))
}
