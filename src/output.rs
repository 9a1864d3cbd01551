//! Writing extracted text as Markdown files with metadata front matter,
//! plus the end-of-run summary report.

use std::fs;

use chrono::Local;

use crate::{pipeline::RunStats, prelude::*};

/// Outputs smaller than this are almost certainly failed extractions.
pub const DEFAULT_MIN_OUTPUT_BYTES: u64 = 100;

/// Metadata recorded in each output file's front matter.
#[derive(Clone, Debug)]
pub struct OutputMetadata {
    /// Lowercase extension of the input file, with a leading dot.
    pub file_type: String,

    /// Input file size in megabytes.
    pub file_size_mb: f64,

    /// Whether image data was requested from the remote provider.
    pub include_images: bool,

    /// Which provider produced the text.
    pub processor: String,
}

/// Writes Markdown outputs under a single output directory.
pub struct OutputWriter {
    output_dir: PathBuf,
}

impl OutputWriter {
    /// Create a writer, creating the output directory if needed.
    pub fn new(output_dir: &Path) -> Result<OutputWriter> {
        fs::create_dir_all(output_dir).with_context(|| {
            format!("failed to create output directory {}", output_dir.display())
        })?;
        Ok(OutputWriter {
            output_dir: output_dir.to_owned(),
        })
    }

    /// Save extracted text as `{token}.md`, with a front-matter block and
    /// the original file name as the main heading.
    pub fn save(
        &self,
        content: &str,
        token: &str,
        original_filename: &str,
        metadata: &OutputMetadata,
    ) -> Result<()> {
        let output_path = self.output_dir.join(format!("{}.md", token));
        let markdown = render_markdown(content, original_filename, metadata);
        fs::write(&output_path, markdown)
            .with_context(|| format!("failed to save {}.md", token))?;
        info!("saved: {}.md", token);
        Ok(())
    }

    /// Does an output file for this token already exist?
    pub fn exists(&self, token: &str) -> bool {
        self.output_dir.join(format!("{}.md", token)).exists()
    }

    /// Write the fixed-format `processing_summary.md` report.
    pub fn write_summary(&self, stats: &RunStats) -> Result<()> {
        let summary_path = self.output_dir.join("processing_summary.md");
        let success_rate =
            (stats.successful as f64 / stats.total.max(1) as f64) * 100.0;

        let mut content = format!(
            "# OCR Processing Summary\n\n\
             **Date:** {}\n\n\
             ## Results\n\
             - **Total files found:** {}\n\
             - **Successfully processed:** {}\n\
             - **Failed:** {}\n\
             - **Skipped (already exists):** {}\n\
             - **Processing time:** {:.1} seconds\n\n\
             ## Success Rate\n\
             {:.1}% of files processed successfully\n\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            stats.total,
            stats.successful,
            stats.failed,
            stats.skipped,
            stats.elapsed.as_secs_f64(),
            success_rate,
        );

        if !stats.failed_files.is_empty() {
            content.push_str("## Failed Files\n");
            for name in &stats.failed_files {
                content.push_str(&format!("- {}\n", name));
            }
            content.push('\n');
        }

        content.push_str(
            "## Notes\n\
             - Check `filename_mappings.txt` for original to sanitized filename mappings\n\
             - Files are processed with the Mistral OCR API, falling back to local OCR\n",
        );

        fs::write(&summary_path, content)
            .context("failed to write processing summary")?;
        info!("processing summary saved to {}", summary_path.display());
        Ok(())
    }

    /// Count and total size of the Markdown files written so far.
    pub fn output_stats(&self) -> (usize, u64) {
        let mut count = 0;
        let mut bytes = 0;
        if let Ok(entries) = fs::read_dir(&self.output_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "md") {
                    count += 1;
                    bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
                }
            }
        }
        (count, bytes)
    }

    /// Remove Markdown outputs below `min_bytes`, a heuristic for detecting
    /// near-empty or garbage extractions. Returns how many were removed.
    /// Maintenance only; not part of the per-run flow.
    pub fn cleanup_small_files(&self, min_bytes: u64) -> Result<usize> {
        let mut removed = 0;
        let entries = fs::read_dir(&self.output_dir).with_context(|| {
            format!("failed to read output directory {}", self.output_dir.display())
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "md") {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if size < min_bytes {
                fs::remove_file(&path).with_context(|| {
                    format!("failed to remove {}", path.display())
                })?;
                removed += 1;
                warn!("removed near-empty file: {}", path.display());
            }
        }
        if removed > 0 {
            info!("cleaned up {} near-empty files", removed);
        }
        Ok(removed)
    }
}

/// Render the complete Markdown document: front matter, heading,
/// processing note, rule, then the extracted text.
fn render_markdown(
    content: &str,
    original_filename: &str,
    metadata: &OutputMetadata,
) -> String {
    let now = Local::now();
    format!(
        "---\n\
         title: \"{original_filename}\"\n\
         source_file: \"{original_filename}\"\n\
         processed_date: \"{date}\"\n\
         processor: \"{processor}\"\n\
         file_type: \"{file_type}\"\n\
         file_size_mb: \"{file_size_mb:.2}\"\n\
         include_images: \"{include_images}\"\n\
         ---\n\n\
         # {original_filename}\n\n\
         *Document processed with {processor} on {note_date}*\n\n\
         ---\n\n\
         {content}",
        date = now.to_rfc3339(),
        processor = metadata.processor,
        file_type = metadata.file_type,
        file_size_mb = metadata.file_size_mb,
        include_images = metadata.include_images,
        note_date = now.format("%Y-%m-%d %H:%M:%S"),
    )
}
