/// # Manifest - live table set
///
/// Records which table generations make up the engine's state so that the
/// set can be swapped in one atomic step and reconstructed after a restart.
///
/// ## File Format
///
/// A small text file, one generation per line, newest last, plus the
/// highest write timestamp persisted so far:
///
/// ```text
/// # table manifest
/// max_timestamp=1708600000000000042
/// 3
/// 7
/// ```
///
/// Lines starting with `#` are comments. Empty lines are ignored. The table
/// for generation `g` lives at `<dir>/<g>.dat`.
///
/// ## Crash Safety
///
/// The manifest is rewritten atomically: write to `MANIFEST.tmp`, fsync, then
/// rename over the existing manifest. A reader never sees a half-written
/// list, so a crash during compaction leaves either the old set or the new
/// one in effect, never a mix.
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Name of the manifest file within the base directory.
pub const MANIFEST_FILENAME: &str = "MANIFEST";

const MANIFEST_TMP_FILENAME: &str = "MANIFEST.tmp";

const MAX_TIMESTAMP_KEY: &str = "max_timestamp=";

#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    /// Live generations, oldest first.
    generations: Vec<u64>,
    /// Upper bound on every timestamp stored in the live tables.
    max_timestamp: u64,
}

impl Manifest {
    /// An empty manifest that will be written to `dir/MANIFEST` on save.
    pub fn empty(dir: &Path) -> Self {
        Self {
            path: dir.join(MANIFEST_FILENAME),
            generations: Vec::new(),
            max_timestamp: 0,
        }
    }

    /// Reads `dir/MANIFEST`, or returns `Ok(None)` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or a line is
    /// not a generation number.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(MANIFEST_FILENAME);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)
            .with_context(|| format!("failed to open manifest at {}", path.display()))?;
        let mut generations = Vec::new();
        let mut max_timestamp = 0;

        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line =
                line.with_context(|| format!("failed to read manifest line {}", line_num + 1))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some(value) = trimmed.strip_prefix(MAX_TIMESTAMP_KEY) {
                max_timestamp = value.parse().with_context(|| {
                    format!(
                        "manifest line {}: invalid max_timestamp '{}'",
                        line_num + 1,
                        value
                    )
                })?;
                continue;
            }

            let generation: u64 = trimmed.parse().with_context(|| {
                format!(
                    "manifest line {}: expected a generation number, got '{}'",
                    line_num + 1,
                    trimmed
                )
            })?;
            generations.push(generation);
        }

        generations.sort_unstable();
        generations.dedup();
        Ok(Some(Self {
            path,
            generations,
            max_timestamp,
        }))
    }

    /// Persists the current list (tmp file, fsync, rename).
    pub fn save(&self) -> Result<()> {
        let tmp_path = self.path.with_file_name(MANIFEST_TMP_FILENAME);

        {
            let mut f = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .with_context(|| {
                    format!("failed to create manifest tmp at {}", tmp_path.display())
                })?;

            writeln!(f, "# table manifest")?;
            writeln!(f, "# one live generation per line, oldest first")?;
            writeln!(f, "{}{}", MAX_TIMESTAMP_KEY, self.max_timestamp)?;
            for generation in &self.generations {
                writeln!(f, "{}", generation)?;
            }
            f.flush()?;
            f.sync_all()?;
        }

        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!("failed to install manifest at {}", self.path.display())
        })?;
        Ok(())
    }

    /// Live generations, oldest first.
    pub fn generations(&self) -> &[u64] {
        &self.generations
    }

    /// Highest generation listed, if any.
    pub fn max_generation(&self) -> Option<u64> {
        self.generations.last().copied()
    }

    pub fn max_timestamp(&self) -> u64 {
        self.max_timestamp
    }

    /// Raises the recorded timestamp bound (does **not** save).
    pub fn observe_timestamp(&mut self, timestamp: u64) {
        self.max_timestamp = self.max_timestamp.max(timestamp);
    }

    /// Appends a newly flushed generation (does **not** save).
    pub fn add(&mut self, generation: u64) {
        self.generations.push(generation);
        self.generations.sort_unstable();
        self.generations.dedup();
    }

    /// Replaces the whole set with a single generation (does **not** save).
    pub fn replace_all(&mut self, generation: u64) {
        self.generations.clear();
        self.generations.push(generation);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
