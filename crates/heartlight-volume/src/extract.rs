//! Full-volume extraction to a directory.
//!
//! Every entry is written as one file named after the entry. A file is first
//! written as `<name>.part` and renamed into place only once it is complete,
//! so a failing entry never leaves a truncated artifact behind. The run stops
//! at the first failure.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::archive::{Decoded, SizePolicy, VolumeArchive};
use crate::entry::VolumeEntry;
use crate::{Error, Result};

/// Extraction settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Treatment of uncompressed entries with inconsistent sizes.
    pub size_policy: SizePolicy,
    /// Decode entries on the rayon pool. Ignored without the `parallel` feature.
    pub parallel: bool,
}

impl ExtractOptions {
    /// Set the size policy.
    pub fn with_size_policy(mut self, size_policy: SizePolicy) -> Self {
        self.size_policy = size_policy;
        self
    }

    /// Enable or disable parallel decoding.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Totals for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Number of artifacts written.
    pub entries: usize,
    /// Total bytes written across all artifacts.
    pub bytes_written: u64,
}

/// Writes every entry of an archive into an output directory.
pub struct Extractor<'a, D> {
    archive: &'a VolumeArchive<D>,
    output_dir: PathBuf,
    options: ExtractOptions,
}

impl<'a, D: AsRef<[u8]> + Sync> Extractor<'a, D> {
    /// Create an extractor with default options.
    pub fn new(archive: &'a VolumeArchive<D>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive,
            output_dir: output_dir.into(),
            options: ExtractOptions::default(),
        }
    }

    /// Replace the extraction options.
    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    /// Get the output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Extract every entry.
    pub fn run(&self) -> Result<ExtractSummary> {
        self.run_with(|_, _| {})
    }

    /// Extract every entry, calling `on_entry` after each artifact is written.
    ///
    /// Artifacts are written and reported in table order regardless of
    /// whether decoding runs in parallel.
    pub fn run_with<F>(&self, mut on_entry: F) -> Result<ExtractSummary>
    where
        F: FnMut(usize, &VolumeEntry),
    {
        fs::create_dir_all(&self.output_dir).map_err(|source| Error::Write {
            path: self.output_dir.clone(),
            source,
        })?;

        info!(
            "Extracting {} entries from {} to {}",
            self.archive.entry_count(),
            self.archive.name(),
            self.output_dir.display()
        );

        let mut summary = ExtractSummary::default();
        let mut emit = |index: usize, entry: &VolumeEntry, decoded: Decoded| -> Result<()> {
            self.archive.trace_decoded(entry, &decoded);
            write_artifact(&self.output_dir, &entry.name, &decoded.data)?;
            summary.entries += 1;
            summary.bytes_written += decoded.data.len() as u64;
            on_entry(index, entry);
            Ok(())
        };

        if self.options.parallel {
            self.run_parallel(&mut emit)?;
        } else {
            self.run_sequential(&mut emit)?;
        }

        info!(
            "Extracted {} entries ({} bytes)",
            summary.entries, summary.bytes_written
        );

        Ok(summary)
    }

    fn run_sequential<E>(&self, emit: &mut E) -> Result<()>
    where
        E: FnMut(usize, &VolumeEntry, Decoded) -> Result<()>,
    {
        for (index, entry) in self.archive.iter().enumerate() {
            let decoded = self.archive.decode(entry, self.options.size_policy)?;
            emit(index, entry, decoded)?;
        }
        Ok(())
    }

    /// Decode one batch of entries per pool-sized window, then emit the batch
    /// in table order. Nothing past the window holding the first failure is
    /// decoded, and nothing past the failure itself is logged or written.
    #[cfg(any(feature = "parallel", test))]
    fn run_parallel<E>(&self, emit: &mut E) -> Result<()>
    where
        E: FnMut(usize, &VolumeEntry, Decoded) -> Result<()>,
    {
        use rayon::prelude::*;

        let window = rayon::current_num_threads().max(1);
        let policy = self.options.size_policy;

        for (batch, entries) in self.archive.entries().chunks(window).enumerate() {
            let decoded: Vec<_> = entries
                .par_iter()
                .map(|entry| self.archive.decode(entry, policy))
                .collect();

            for (i, (entry, result)) in entries.iter().zip(decoded).enumerate() {
                emit(batch * window + i, entry, result?)?;
            }
        }
        Ok(())
    }

    #[cfg(not(any(feature = "parallel", test)))]
    fn run_parallel<E>(&self, emit: &mut E) -> Result<()>
    where
        E: FnMut(usize, &VolumeEntry, Decoded) -> Result<()>,
    {
        debug!("Built without the parallel feature, decoding sequentially");
        self.run_sequential(emit)
    }
}

/// Write one artifact, replacing any existing file of the same name.
fn write_artifact(dir: &Path, name: &str, data: &[u8]) -> Result<()> {
    let path = dir.join(name);
    let part = dir.join(format!("{name}.part"));

    let result = fs::write(&part, data).and_then(|()| fs::rename(&part, &path));
    if let Err(source) = result {
        let _ = fs::remove_file(&part);
        return Err(Error::Write { path, source });
    }

    debug!("Wrote {} ({} bytes)", path.display(), data.len());
    Ok(())
}
