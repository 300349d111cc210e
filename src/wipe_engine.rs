use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, info, warn};
use zeroize::ZeroizeOnDrop;

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::WipeError;
use crate::types::{JobProgress, WipeJob};

/// Trait for reporting wipe progress
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: JobProgress);
}

/// No-op progress reporter for when no progress reporting is needed
pub struct NoopProgressReporter;

impl ProgressReporter for NoopProgressReporter {
    fn report(&self, _progress: JobProgress) {}
}

/// Byte pattern written by one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPattern {
    Zeros,
    Ones,
    Random,
}

impl PassPattern {
    /// Pass 0 writes zeros, pass 1 writes 0xFF, every later pass writes fresh random bytes.
    pub fn for_pass(pass_index: u32) -> Self {
        match pass_index {
            0 => PassPattern::Zeros,
            1 => PassPattern::Ones,
            _ => PassPattern::Random,
        }
    }

    fn fill(&self, buf: &mut [u8], rng: &SystemRandom) -> io::Result<()> {
        match self {
            PassPattern::Zeros => buf.fill(0x00),
            PassPattern::Ones => buf.fill(0xFF),
            PassPattern::Random => rng
                .fill(buf)
                .map_err(|_| io::Error::other("failed to generate secure random data"))?,
        }
        Ok(())
    }
}

/// An open file being overwritten in place.
pub trait WipeFile: Write {
    /// Forces written data to durable storage.
    fn sync(&mut self) -> io::Result<()>;
}

impl WipeFile for File {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

/// Filesystem operations the engine performs on a target.
pub trait WipeBackend: Send + Sync {
    /// Opens an existing file for in-place writing, positioned at offset 0.
    fn open_for_overwrite(&self, path: &Path) -> io::Result<Box<dyn WipeFile>>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// Backend that talks to the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskBackend;

impl WipeBackend for DiskBackend {
    fn open_for_overwrite(&self, path: &Path) -> io::Result<Box<dyn WipeFile>> {
        // No truncate: the pass must land on the existing extents.
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Box::new(file))
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }
}

/// Which step of a file's erasure failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStage {
    Stat,
    Overwrite { pass: u32 },
    Delete,
}

impl std::fmt::Display for FileStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStage::Stat => f.write_str("stat"),
            FileStage::Overwrite { pass } => write!(f, "overwrite pass {}", pass + 1),
            FileStage::Delete => f.write_str("delete"),
        }
    }
}

/// A file that could not be fully erased. Never fatal to its job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub stage: FileStage,
    pub reason: String,
}

impl std::fmt::Display for FileFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed for {}: {}", self.stage, self.path.display(), self.reason)
    }
}

/// Result of wiping one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WipeOutcome {
    pub files_total: usize,
    pub files_wiped: usize,
    /// Sum of file sizes found by the scan.
    pub bytes_total: u64,
    pub bytes_written: u64,
    pub failures: Vec<FileFailure>,
    /// `Some(false)` when the directory tree could not be removed afterwards.
    pub directory_removed: Option<bool>,
}

/// Files reachable from a target path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet {
    /// The target with every symlink in it resolved.
    pub root: PathBuf,
    pub files: Vec<PathBuf>,
    pub total_size: u64,
    pub is_directory: bool,
}

/// Buffer that zeros itself on drop so pass patterns do not linger in memory.
#[derive(ZeroizeOnDrop)]
struct SecureBuffer {
    data: Vec<u8>,
}

impl SecureBuffer {
    fn new(size: usize) -> Self {
        Self { data: vec![0u8; size] }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Keeps per-job progress monotonic and clamped to 100.
struct ProgressTracker<'a> {
    reporter: &'a dyn ProgressReporter,
    asset_id: &'a str,
    last: f32,
}

impl<'a> ProgressTracker<'a> {
    fn new(reporter: &'a dyn ProgressReporter, asset_id: &'a str) -> Self {
        Self { reporter, asset_id, last: 0.0 }
    }

    fn report(&mut self, percent: f32, status: impl Into<String>) {
        let percent = percent.clamp(0.0, 100.0).max(self.last);
        self.last = percent;
        self.reporter.report(JobProgress {
            asset_id: self.asset_id.to_string(),
            percent,
            status: status.into(),
        });
    }
}

/// Percentage after `pass_done` of `passes` passes on file `file_index` of `total_files`.
pub fn job_percent(file_index: usize, total_files: usize, pass_done: u32, passes: u32) -> f32 {
    if total_files == 0 || passes == 0 {
        return 100.0;
    }
    let per_file = 100.0 / total_files as f64;
    let base = file_index as f64 * per_file;
    let within = (pass_done as f64 / passes as f64) * per_file;
    (base + within).min(100.0) as f32
}

/// Multi-pass overwrite engine for a single target.
pub struct WipeEngine {
    backend: Arc<dyn WipeBackend>,
    chunk_size: usize,
    rng: SystemRandom,
}

impl Default for WipeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl WipeEngine {
    pub fn new() -> Self {
        Self::with_backend(Arc::new(DiskBackend), DEFAULT_CHUNK_SIZE)
    }

    pub fn with_backend(backend: Arc<dyn WipeBackend>, chunk_size: usize) -> Self {
        Self {
            backend,
            chunk_size: chunk_size.max(1),
            rng: SystemRandom::new(),
        }
    }

    /// Enumerates every regular file under `target`. A symlinked target is
    /// resolved first; symlinks below it are not followed and are left for
    /// directory removal.
    pub fn resolve_targets(target: &Path) -> Result<TargetSet, WipeError> {
        let scan_err = |source: io::Error| WipeError::Scan {
            path: target.to_path_buf(),
            source,
        };
        let root = fs::canonicalize(target).map_err(scan_err)?;
        let metadata = fs::metadata(&root).map_err(scan_err)?;

        let mut set = TargetSet {
            root,
            ..TargetSet::default()
        };
        if metadata.is_file() {
            set.files.push(set.root.clone());
            set.total_size = metadata.len();
        } else if metadata.is_dir() {
            set.is_directory = true;
            let root = set.root.clone();
            Self::collect_files(&root, &mut set);
        }
        Ok(set)
    }

    fn collect_files(dir: &Path, set: &mut TargetSet) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %dir.display(), error = %err, "failed to read directory during scan");
                return;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    warn!(path = %dir.display(), error = %err, "failed to read directory entry");
                    continue;
                }
            };

            let path = entry.path();
            // file_type() does not follow symlinks
            match entry.file_type() {
                Ok(ft) if ft.is_file() => {
                    set.total_size += entry.metadata().map(|m| m.len()).unwrap_or(0);
                    set.files.push(path);
                }
                Ok(ft) if ft.is_dir() => Self::collect_files(&path, set),
                Ok(_) => debug!(path = %path.display(), "skipping non-regular entry"),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to read entry type");
                }
            }
        }
    }

    /// Overwrites and deletes every file reachable from the job's target.
    ///
    /// Only an unreadable or empty target fails the job; per-file errors are
    /// collected into [`WipeOutcome::failures`].
    pub fn wipe_target(
        &self,
        job: &WipeJob,
        reporter: &dyn ProgressReporter,
    ) -> Result<WipeOutcome, WipeError> {
        let target = Path::new(&job.target_path);
        let passes = job.passes();
        let mut progress = ProgressTracker::new(reporter, &job.asset_id);

        progress.report(0.0, "Scanning files...");
        let set = Self::resolve_targets(target)?;
        let total_files = set.files.len();
        if total_files == 0 {
            return Err(WipeError::NoFilesFound(target.to_path_buf()));
        }

        info!(
            asset_id = %job.asset_id,
            files = total_files,
            bytes = set.total_size,
            passes,
            "wiping target"
        );

        let mut outcome = WipeOutcome {
            files_total: total_files,
            bytes_total: set.total_size,
            ..WipeOutcome::default()
        };

        for (file_index, file) in set.files.iter().enumerate() {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());

            match self.wipe_file(file, passes, |pass| {
                progress.report(
                    job_percent(file_index, total_files, pass + 1, passes),
                    format!(
                        "Pass {}/{} | File {}/{}: {}",
                        pass + 1,
                        passes,
                        file_index + 1,
                        total_files,
                        name
                    ),
                );
            }) {
                Ok(written) => {
                    outcome.files_wiped += 1;
                    outcome.bytes_written += written;
                }
                Err(failure) => {
                    warn!(asset_id = %job.asset_id, %failure, "file not fully wiped");
                    outcome.failures.push(failure);
                }
            }

            progress.report(
                job_percent(file_index + 1, total_files, 0, passes),
                format!("File {}/{} done", file_index + 1, total_files),
            );
        }

        if set.is_directory {
            progress.report(100.0, "Removing directory...");
            match self.backend.remove_dir_all(&set.root) {
                Ok(()) => outcome.directory_removed = Some(true),
                Err(err) => {
                    warn!(path = %set.root.display(), error = %err, "directory removal failed");
                    outcome.directory_removed = Some(false);
                }
            }
        }

        progress.report(100.0, "Completed");
        Ok(outcome)
    }

    /// Runs every pass on one file, then deletes it. Returns bytes written.
    fn wipe_file(
        &self,
        path: &Path,
        passes: u32,
        mut on_pass: impl FnMut(u32),
    ) -> Result<u64, FileFailure> {
        let fail = |stage: FileStage, err: io::Error| FileFailure {
            path: path.to_path_buf(),
            stage,
            reason: err.to_string(),
        };

        let metadata = fs::symlink_metadata(path).map_err(|e| fail(FileStage::Stat, e))?;
        if !metadata.is_file() {
            return Err(fail(
                FileStage::Stat,
                io::Error::other("not a regular file"),
            ));
        }
        let file_size = metadata.len();

        let buffer_len = usize::try_from(file_size)
            .unwrap_or(usize::MAX)
            .clamp(1, self.chunk_size);
        let mut buffer = SecureBuffer::new(buffer_len);
        let mut written = 0u64;

        for pass in 0..passes {
            let pattern = PassPattern::for_pass(pass);
            debug!(path = %path.display(), pass, ?pattern, "overwrite pass");
            self.write_pass(path, file_size, pattern, buffer.as_mut_slice())
                .map_err(|e| fail(FileStage::Overwrite { pass }, e))?;
            written += file_size;
            on_pass(pass);
        }

        self.backend
            .remove_file(path)
            .map_err(|e| fail(FileStage::Delete, e))?;
        Ok(written)
    }

    fn write_pass(
        &self,
        path: &Path,
        file_size: u64,
        pattern: PassPattern,
        buffer: &mut [u8],
    ) -> io::Result<()> {
        let mut file = self.backend.open_for_overwrite(path)?;

        if pattern != PassPattern::Random {
            pattern.fill(buffer, &self.rng)?;
        }

        let mut remaining = file_size;
        while remaining > 0 {
            let chunk = remaining.min(buffer.len() as u64) as usize;
            if pattern == PassPattern::Random {
                // fresh bytes for every chunk, never reused across passes or files
                pattern.fill(&mut buffer[..chunk], &self.rng)?;
            }
            file.write_all(&buffer[..chunk])?;
            remaining -= chunk as u64;
        }

        file.sync()
    }
}
