//! The `cleanup` subcommand.

use clap::Args;

use crate::{
    output::{DEFAULT_MIN_OUTPUT_BYTES, OutputWriter},
    prelude::*,
    ui::Ui,
};

/// Options for the `cleanup` subcommand.
#[derive(Args, Debug)]
pub struct CleanupOpts {
    /// Output directory to clean.
    #[clap(long, default_value = "./ocr_output")]
    pub output_dir: PathBuf,

    /// Remove Markdown outputs smaller than this many bytes.
    #[clap(long, default_value_t = DEFAULT_MIN_OUTPUT_BYTES)]
    pub min_bytes: u64,
}

/// The `cleanup` subcommand: remove near-empty Markdown outputs left
/// behind by failed extractions.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_cleanup(ui: Ui, opts: &CleanupOpts) -> Result<()> {
    let writer = OutputWriter::new(&opts.output_dir)?;
    let removed = writer.cleanup_small_files(opts.min_bytes)?;
    ui.display_message("🧹", &format!("removed {} near-empty output files", removed));
    Ok(())
}
