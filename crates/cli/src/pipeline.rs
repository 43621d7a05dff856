//! Ingestion run: discover input files, segment each one and append the chunks
//! to a JSONL file.

use crate::config::InputsConfig;
use crate::scanner::FileScanner;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use ragchunk_chunker::{keys, Chunk, Chunker, DocumentKind};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const UNKNOWN_SOURCE: &str = "unknown";

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub files: usize,
    pub chunks: usize,
    pub tokens: usize,
    pub failures: usize,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Files: {} | Chunks: {} | Tokens: {} | Failures: {}",
            self.files, self.chunks, self.tokens, self.failures
        )
    }
}

pub struct Pipeline {
    chunker: Chunker,
    quiet: bool,
}

impl Pipeline {
    pub fn new(chunker: Chunker, quiet: bool) -> Self {
        Self { chunker, quiet }
    }

    /// Process every configured directory in order. The output file is
    /// truncated first; a failing file is logged and skipped.
    pub fn run(&self, inputs: &InputsConfig) -> Result<RunStats> {
        let jobs = collect_jobs(inputs);

        if let Some(parent) = inputs.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = File::create(&inputs.output)
            .with_context(|| format!("Failed to create {}", inputs.output.display()))?;
        let mut writer = BufWriter::new(file);

        let progress = self.progress_bar(jobs.len());
        let mut stats = RunStats::default();

        for (kind, path) in &jobs {
            progress.set_message(display_name(path));
            match self.process_file(*kind, path, &mut writer) {
                Ok(chunks) => {
                    let summary = Chunker::get_stats(&chunks);
                    log::debug!("{}: {summary}", path.display());
                    stats.files += 1;
                    stats.chunks += summary.total_chunks;
                    stats.tokens += summary.total_tokens;
                }
                Err(e) => {
                    log::error!("Failed to process {}: {e:#}", path.display());
                    stats.failures += 1;
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        writer
            .flush()
            .with_context(|| format!("Failed to write {}", inputs.output.display()))?;
        log::info!("{stats} -> {}", inputs.output.display());
        Ok(stats)
    }

    /// Segment one file and append its chunks
    pub fn process_file(
        &self,
        kind: DocumentKind,
        path: &Path,
        writer: &mut impl Write,
    ) -> Result<Vec<Chunk>> {
        let chunks = segment_path(&self.chunker, kind, path)?;
        for chunk in &chunks {
            let line = chunk
                .to_json_line()
                .with_context(|| format!("Failed to serialize chunk {}", chunk.id))?;
            writeln!(writer, "{line}").context("Failed to write chunk")?;
        }
        Ok(chunks)
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}") {
            bar.set_style(style);
        }
        bar
    }
}

/// Read and segment one file, naming chunks without a source after the file
pub fn segment_path(chunker: &Chunker, kind: DocumentKind, path: &Path) -> Result<Vec<Chunk>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = display_name(path);

    let mut chunks = chunker.segment(kind, &raw, &name);
    for chunk in &mut chunks {
        if chunk.metadata.get_str(keys::SOURCE).map_or(true, |s| s == UNKNOWN_SOURCE) {
            chunk.metadata.insert(keys::SOURCE, name.as_str());
        }
    }
    Ok(chunks)
}

fn collect_jobs(inputs: &InputsConfig) -> Vec<(DocumentKind, PathBuf)> {
    let mut jobs = Vec::new();
    for (kind, dir) in inputs.directories() {
        if !dir.is_dir() {
            log::warn!("Skipping missing {kind} directory {}", dir.display());
            continue;
        }
        let files = FileScanner::new(dir, kind.extension()).scan();
        log::info!("{}: {} {kind} files", dir.display(), files.len());
        jobs.extend(files.into_iter().map(|path| (kind, path)));
    }
    jobs
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(UNKNOWN_SOURCE)
        .to_string()
}
