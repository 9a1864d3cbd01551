//! Run configuration.

use std::{collections::HashSet, env, time::Duration};

use clap::ValueEnum;

use crate::prelude::*;

/// Default cap on input file size, in megabytes. Larger files are rejected
/// without attempting either provider.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 10;

/// Default timeout for a single OCR API request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Default number of attempts per file against the remote provider.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay between retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Fixed pause between successive files, to bound our request rate against
/// the remote API.
pub const DEFAULT_INTER_FILE_DELAY: Duration = Duration::from_millis(500);

/// Files smaller than this are assumed to be truncated or corrupt.
pub const MIN_INPUT_SIZE: u64 = 1024;

/// Which group of file types should we process?
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum FileTypeFilter {
    /// Every supported extension.
    #[default]
    All,
    /// PDF files only.
    Pdf,
    /// Raster images only.
    Images,
    /// Office documents only.
    Documents,
}

impl FileTypeFilter {
    /// The extensions (lowercase, without dots) accepted by this filter.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            FileTypeFilter::Pdf => &["pdf"],
            FileTypeFilter::Images => &["jpg", "jpeg", "png", "avif"],
            FileTypeFilter::Documents => &["pptx", "docx"],
            FileTypeFilter::All => {
                &["pdf", "jpg", "jpeg", "png", "avif", "pptx", "docx"]
            }
        }
    }
}

/// Immutable configuration for one processing run.
///
/// Built once from the CLI options and validated at construction.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Directory tree to scan for input files.
    pub input_dir: PathBuf,

    /// Directory for Markdown output and run artifacts.
    pub output_dir: PathBuf,

    /// Ask the remote provider to include base64 image data in its response.
    pub include_images: bool,

    /// Skip files whose output already exists.
    pub resume: bool,

    /// Which file types to process.
    pub file_types: FileTypeFilter,

    /// If non-empty, process only inputs whose file name appears here. Used
    /// to re-run specific failed files, usually with a raised size limit.
    pub only_names: Vec<String>,

    /// Maximum input file size, in megabytes.
    pub max_file_size_mb: u64,

    /// Timeout for a single OCR API request.
    pub request_timeout: Duration,

    /// Number of attempts per file against the remote provider.
    pub max_retries: u32,

    /// Base delay between retries.
    pub retry_delay: Duration,

    /// Pause between successive files.
    pub inter_file_delay: Duration,

    /// Mistral API key.
    pub api_key: String,
}

impl RunConfig {
    /// Validate this configuration, returning an error before any processing
    /// starts if it is unusable.
    pub fn validate(&self) -> Result<()> {
        if !self.input_dir.exists() {
            return Err(anyhow::anyhow!(
                "input directory does not exist: {}",
                self.input_dir.display()
            ));
        }
        if !self.input_dir.is_dir() {
            return Err(anyhow::anyhow!(
                "input path is not a directory: {}",
                self.input_dir.display()
            ));
        }
        if self.api_key.is_empty() {
            return Err(anyhow::anyhow!(
                "MISTRAL_API_KEY not found in the environment. Add it to your \
                 `.env` file: MISTRAL_API_KEY=your_key_here"
            ));
        }
        Ok(())
    }

    /// Look up the Mistral API key in the environment. Missing credentials
    /// are reported by [`RunConfig::validate`].
    pub fn api_key_from_env() -> String {
        env::var("MISTRAL_API_KEY").unwrap_or_default()
    }

    /// The set of accepted extensions, lowercase.
    pub fn accepted_extensions(&self) -> HashSet<&'static str> {
        self.file_types.extensions().iter().copied().collect()
    }

    /// Maximum input file size in bytes. A file of exactly this size is
    /// still accepted.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    /// Output tokens from a previous run, for resume mode. Run-level
    /// artifacts are not inputs, so they don't count.
    pub fn processed_tokens(&self) -> HashSet<String> {
        let mut processed = HashSet::new();
        if !self.output_dir.exists() {
            return processed;
        }
        for entry in walkdir::WalkDir::new(&self.output_dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md")
                && path.file_name().is_some_and(|n| n != "processing_summary.md")
            {
                if let Some(stem) = path.file_stem() {
                    processed.insert(stem.to_string_lossy().into_owned());
                }
            }
        }
        processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(input_dir: PathBuf) -> RunConfig {
        RunConfig {
            input_dir,
            output_dir: PathBuf::from("out"),
            include_images: false,
            resume: false,
            file_types: FileTypeFilter::All,
            only_names: vec![],
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            inter_file_delay: DEFAULT_INTER_FILE_DELAY,
            api_key: "test-key".to_owned(),
        }
    }

    #[test]
    fn filter_extension_groups() {
        assert_eq!(FileTypeFilter::Pdf.extensions(), &["pdf"]);
        assert!(FileTypeFilter::Images.extensions().contains(&"avif"));
        assert!(!FileTypeFilter::Documents.extensions().contains(&"pdf"));
        assert_eq!(FileTypeFilter::All.extensions().len(), 7);
    }

    #[test]
    fn validate_rejects_missing_input_dir() {
        let config = test_config(PathBuf::from("/no/such/directory"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_file_as_input_dir() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = test_config(file.path().to_owned());
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_missing_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path().to_owned());
        config.api_key = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn processed_tokens_ignores_summary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.md"), "x").unwrap();
        std::fs::write(dir.path().join("processing_summary.md"), "x").unwrap();
        std::fs::write(dir.path().join("filename_mappings.txt"), "x").unwrap();
        let mut config = test_config(dir.path().to_owned());
        config.output_dir = dir.path().to_owned();
        let processed = config.processed_tokens();
        assert!(processed.contains("report"));
        assert_eq!(processed.len(), 1);
    }
}
