//! The `run` subcommand.

use std::time::Duration;

use clap::Args;

use crate::{
    config::{
        DEFAULT_MAX_FILE_SIZE_MB, DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT,
        DEFAULT_RETRY_DELAY, FileTypeFilter, RunConfig,
    },
    pipeline::Pipeline,
    prelude::*,
    providers::{mistral::MistralOcr, tesseract::LocalOcr},
    ui::Ui,
};

/// Options for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunOpts {
    /// Input directory containing documents to process.
    #[clap(long, default_value = ".")]
    pub input_dir: PathBuf,

    /// Output directory for Markdown files.
    #[clap(long, default_value = "./ocr_output")]
    pub output_dir: PathBuf,

    /// Which file types to process.
    #[clap(long, value_enum, default_value = "all")]
    pub file_types: FileTypeFilter,

    /// Skip files whose output already exists.
    #[clap(long)]
    pub resume: bool,

    /// Include base64 image data in API requests.
    #[clap(long)]
    pub include_images: bool,

    /// Maximum input file size, in megabytes.
    #[clap(long, default_value_t = DEFAULT_MAX_FILE_SIZE_MB)]
    pub max_file_size_mb: u64,

    /// Timeout for a single OCR API request, in seconds.
    #[clap(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// Number of attempts per file against the remote provider.
    #[clap(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Base delay between retries, in seconds.
    #[clap(long, default_value_t = DEFAULT_RETRY_DELAY.as_secs())]
    pub retry_delay: u64,

    /// Process only inputs with this exact file name. May be repeated.
    /// Useful for re-running failed files with a raised size limit.
    #[clap(long = "only", value_name = "FILENAME")]
    pub only_names: Vec<String>,
}

impl RunOpts {
    fn to_config(&self) -> RunConfig {
        RunConfig {
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
            include_images: self.include_images,
            resume: self.resume,
            file_types: self.file_types,
            only_names: self.only_names.clone(),
            max_file_size_mb: self.max_file_size_mb,
            request_timeout: Duration::from_secs(self.timeout),
            max_retries: self.max_retries,
            retry_delay: Duration::from_secs(self.retry_delay),
            inter_file_delay: crate::config::DEFAULT_INTER_FILE_DELAY,
            api_key: RunConfig::api_key_from_env(),
        }
    }
}

/// The `run` subcommand: convert every supported file under the input
/// directory to Markdown.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_run(ui: Ui, opts: &RunOpts) -> Result<()> {
    let config = opts.to_config();
    config.validate()?;
    info!("starting OCR processing");
    info!("input directory: {}", config.input_dir.display());
    info!("output directory: {}", config.output_dir.display());

    let primary = Box::new(MistralOcr::new(&config));
    let fallback = Box::new(LocalOcr::new());
    let mut pipeline = Pipeline::new(config, primary, fallback)?;
    let stats = pipeline.run(&ui).await?;

    ui.display_message(
        "📄",
        &format!(
            "{} processed, {} failed, {} skipped",
            stats.successful, stats.failed, stats.skipped
        ),
    );
    if stats.failed > 0 {
        return Err(anyhow::anyhow!(
            "{} of {} files could not be processed: {}",
            stats.failed,
            stats.total,
            stats.failed_files.join(", ")
        ));
    }
    Ok(())
}
