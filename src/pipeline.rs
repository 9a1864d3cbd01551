//! The per-file processing pipeline.
//!
//! For each discovered file we decide which OCR provider to use, how to
//! name the output, and whether to skip it entirely, then persist the
//! result. A single file's failure never aborts the run; only total
//! unavailability of both providers does, and that happens before any
//! file is attempted.

use std::{
    collections::{BTreeMap, HashSet},
    time::{Duration, Instant},
};

use tokio::time::sleep;
use walkdir::WalkDir;

use crate::{
    config::{MIN_INPUT_SIZE, RunConfig},
    output::{OutputMetadata, OutputWriter},
    prelude::*,
    providers::OcrProvider,
    sanitize::FilenameSanitizer,
    ui::{ProgressConfig, Ui},
};

/// One discovered candidate file.
#[derive(Clone, Debug)]
pub struct FileTask {
    /// Absolute path to the input file.
    pub path: PathBuf,

    /// The file name, for logs and reports.
    pub file_name: String,

    /// Lowercase extension.
    pub extension: String,

    /// Size in bytes.
    pub size: u64,
}

/// Counters for one run. Mutated only by the pipeline, finalized once.
#[derive(Clone, Debug, Default)]
pub struct RunStats {
    /// Files discovered.
    pub total: usize,

    /// Files converted and persisted.
    pub successful: usize,

    /// Files that failed validation, both providers, or the write.
    pub failed: usize,

    /// Files skipped by resume mode.
    pub skipped: usize,

    /// Names of the failed files, in processing order.
    pub failed_files: Vec<String>,

    /// Wall-clock time for the whole run.
    pub elapsed: Duration,
}

/// Terminal state of one file.
enum FileOutcome {
    Success,
    /// Failed after at least one provider attempt.
    Failed,
    /// Rejected by validation before any provider was attempted.
    FailedBeforeAttempt,
    Skipped,
}

/// The orchestrator: walks the input tree and drives the primary and
/// fallback providers over each file, strictly sequentially.
pub struct Pipeline {
    config: RunConfig,
    sanitizer: FilenameSanitizer,
    primary: Box<dyn OcrProvider>,
    fallback: Box<dyn OcrProvider>,
    writer: OutputWriter,
}

impl Pipeline {
    pub fn new(
        config: RunConfig,
        primary: Box<dyn OcrProvider>,
        fallback: Box<dyn OcrProvider>,
    ) -> Result<Pipeline> {
        let writer = OutputWriter::new(&config.output_dir)?;
        Ok(Pipeline {
            config,
            sanitizer: FilenameSanitizer::new(),
            primary,
            fallback,
            writer,
        })
    }

    /// Process every supported file under the input root.
    #[instrument(level = "debug", skip_all)]
    pub async fn run(&mut self, ui: &Ui) -> Result<RunStats> {
        let start = Instant::now();

        // Probe provider availability before scanning anything.
        info!("testing {} connection...", self.primary.name());
        if !self.primary.check_available().await {
            warn!(
                "{} connection failed, checking fallback OCR...",
                self.primary.name()
            );
            if self.fallback.check_available().await {
                info!("fallback OCR available, continuing with local processing");
            } else {
                error!("both OCR providers are unavailable, cannot proceed");
                return Ok(RunStats::default());
            }
        }

        let tasks = self.discover_files();
        if tasks.is_empty() {
            warn!("no supported files found to process");
            return Ok(RunStats::default());
        }
        log_file_type_breakdown(&tasks);

        let processed = if self.config.resume {
            let processed = self.config.processed_tokens();
            info!("resume mode: found {} already processed files", processed.len());
            processed
        } else {
            HashSet::new()
        };

        let pb = ui.new_progress_bar(
            &ProgressConfig {
                emoji: "📄",
                msg: "OCRing files",
                done_msg: "OCRed files",
            },
            tasks.len() as u64,
        );

        let mut stats = RunStats {
            total: tasks.len(),
            ..RunStats::default()
        };
        for (i, task) in tasks.iter().enumerate() {
            info!(
                "processing file {}/{}: {}",
                i + 1,
                tasks.len(),
                task.file_name
            );
            let outcome = self.process_one(task, &processed).await;
            match &outcome {
                FileOutcome::Success => stats.successful += 1,
                FileOutcome::Failed | FileOutcome::FailedBeforeAttempt => {
                    stats.failed += 1;
                    stats.failed_files.push(task.file_name.clone());
                }
                FileOutcome::Skipped => stats.skipped += 1,
            }
            pb.inc(1);

            // Brief pause after each attempt, to be respectful to the API.
            if matches!(outcome, FileOutcome::Success | FileOutcome::Failed) {
                sleep(self.config.inter_file_delay).await;
            }
        }
        pb.finish();
        stats.elapsed = start.elapsed();

        self.sanitizer.save_mapping_file(&self.config.output_dir)?;
        self.writer.write_summary(&stats)?;
        self.log_final_stats(&stats);

        Ok(stats)
    }

    /// Recursively enumerate supported files, deduplicated and sorted by
    /// lowercase name for a deterministic processing order.
    fn discover_files(&self) -> Vec<FileTask> {
        let accepted = self.config.accepted_extensions();
        let mut tasks = Vec::new();
        for entry in WalkDir::new(&self.config.input_dir)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("error scanning input directory: {}", err);
                    None
                }
            })
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let extension = match path.extension() {
                Some(ext) => ext.to_string_lossy().to_lowercase(),
                None => continue,
            };
            if !accepted.contains(extension.as_str()) {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !self.config.only_names.is_empty()
                && !self.config.only_names.contains(&file_name)
            {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            tasks.push(FileTask {
                path: path.to_owned(),
                file_name,
                extension,
                size,
            });
        }

        tasks.sort_by(|a, b| {
            (a.file_name.to_lowercase(), &a.path)
                .cmp(&(b.file_name.to_lowercase(), &b.path))
        });
        tasks.dedup_by(|a, b| a.path == b.path);
        tasks
    }

    /// Drive one file to a terminal state. Every failure is contained here
    /// so one bad file never stops the batch.
    async fn process_one(
        &mut self,
        task: &FileTask,
        processed: &HashSet<String>,
    ) -> FileOutcome {
        // Size checks happen before any provider is attempted.
        if task.size > self.config.max_file_size_bytes() {
            warn!(
                "file too large ({:.1} MB): {} (max: {} MB)",
                task.size as f64 / (1024.0 * 1024.0),
                task.file_name,
                self.config.max_file_size_mb
            );
            return FileOutcome::FailedBeforeAttempt;
        }
        if task.size < MIN_INPUT_SIZE {
            warn!("file too small: {}", task.file_name);
            return FileOutcome::FailedBeforeAttempt;
        }

        let token = self.sanitizer.sanitize(&task.path);

        if self.config.resume && processed.contains(&token) {
            info!("skipping already processed file: {}", task.file_name);
            return FileOutcome::Skipped;
        }
        if self.writer.exists(&token) {
            if self.config.resume {
                info!("output file exists, skipping: {}", task.file_name);
                return FileOutcome::Skipped;
            }
            warn!("output file exists, will overwrite: {}.md", token);
        }

        let mut result = None;
        debug!("attempting {} for {}", self.primary.name(), task.file_name);
        match self.primary.extract(&task.path).await {
            Ok(extracted) => result = extracted,
            Err(err) => {
                warn!(
                    "{} failed for {}: {:?}",
                    self.primary.name(),
                    task.file_name,
                    err
                );
            }
        }

        if result.is_none() {
            info!("trying fallback OCR for {}", task.file_name);
            match self.fallback.extract(&task.path).await {
                Ok(extracted) => result = extracted,
                Err(err) => {
                    error!(
                        "fallback OCR also failed for {}: {:?}",
                        task.file_name, err
                    );
                }
            }
        }

        let Some(ocr) = result else {
            error!("both OCR providers failed for {}", task.file_name);
            return FileOutcome::Failed;
        };
        if let Some(pages) = &ocr.pages {
            debug!("{} returned {} pages", ocr.provider, pages.len());
        }

        let metadata = OutputMetadata {
            file_type: format!(".{}", task.extension),
            file_size_mb: task.size as f64 / (1024.0 * 1024.0),
            include_images: self.config.include_images,
            processor: ocr.provider.to_owned(),
        };
        match self.writer.save(&ocr.text, &token, &task.file_name, &metadata) {
            Ok(()) => {
                info!(
                    "successfully processed: {} -> {}.md (using {})",
                    task.file_name, token, ocr.provider
                );
                FileOutcome::Success
            }
            Err(err) => {
                error!("failed to save output for {}: {:?}", task.file_name, err);
                FileOutcome::Failed
            }
        }
    }

    fn log_final_stats(&self, stats: &RunStats) {
        let (output_files, output_bytes) = self.writer.output_stats();
        info!("processing complete");
        info!("total files found: {}", stats.total);
        info!("successfully processed: {}", stats.successful);
        info!("failed: {}", stats.failed);
        info!("skipped: {}", stats.skipped);
        info!("processing time: {:.1} seconds", stats.elapsed.as_secs_f64());
        if stats.total > 0 {
            let rate = (stats.successful as f64 / stats.total as f64) * 100.0;
            info!("success rate: {:.1}%", rate);
        }
        info!("output files: {}", output_files);
        info!(
            "output size: {:.1} MB",
            output_bytes as f64 / (1024.0 * 1024.0)
        );
    }
}

/// Log how many files of each type we found.
fn log_file_type_breakdown(tasks: &[FileTask]) {
    let mut counts = BTreeMap::new();
    for task in tasks {
        *counts.entry(task.extension.as_str()).or_insert(0usize) += 1;
    }
    info!("found {} supported files to process:", tasks.len());
    for (extension, count) in counts {
        info!("  .{}: {} files", extension, count);
    }
}
