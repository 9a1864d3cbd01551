//! The local fallback: Tesseract for raster images, lopdf text extraction
//! for PDFs. No network dependency.

use std::process::Output;

use tokio::process::Command;

use super::{OcrProvider, OcrText};
use crate::{data_url::is_raster_image, prelude::*};

/// Expected document language, plus English as a default fallback.
const TESSERACT_LANGUAGES: &str = "hun+eng";

/// Local OCR provider wrapping the `tesseract` CLI tool and lopdf.
#[non_exhaustive]
pub struct LocalOcr {}

impl Default for LocalOcr {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalOcr {
    pub fn new() -> LocalOcr {
        info!("initializing fallback OCR (Tesseract)");
        LocalOcr {}
    }

    /// OCR a raster image by normalizing it to RGB, writing a temporary
    /// PNG, and running the `tesseract` CLI on it.
    async fn ocr_image(&self, path: &Path) -> Result<Option<String>> {
        let img = image::open(path)
            .with_context(|| format!("cannot open image {}", path.display()))?;
        let rgb = img.to_rgb8();

        let tmpdir = tempfile::TempDir::with_prefix("ocrmill-tesseract")?;
        let input_path = tmpdir.path().join("input.png");
        rgb.save(&input_path).context("cannot write tesseract input file")?;

        let text = run_tesseract(&input_path, tmpdir.path()).await?;
        Ok(tidy_ocr_text(&text))
    }

    /// Extract searchable text from a PDF, page by page. A page that fails
    /// extraction is skipped with a warning; it is not fatal to the file.
    fn extract_pdf_text(&self, path: &Path) -> Result<Option<String>> {
        let doc = lopdf::Document::load(path)
            .with_context(|| format!("cannot load PDF {}", path.display()))?;

        let mut sections = Vec::new();
        for (page_number, _) in doc.get_pages() {
            match doc.extract_text(&[page_number]) {
                Ok(text) if !text.trim().is_empty() => {
                    sections.push(format!("## Page {}\n\n{}", page_number, text.trim()));
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(
                        "failed to extract text from page {} of {}: {}",
                        page_number,
                        path.display(),
                        err
                    );
                }
            }
        }

        if sections.is_empty() {
            warn!("no text extracted from PDF {}", path.display());
            Ok(None)
        } else {
            Ok(Some(sections.join("\n\n")))
        }
    }
}

#[async_trait::async_trait]
impl OcrProvider for LocalOcr {
    fn name(&self) -> &'static str {
        "Tesseract OCR (Fallback)"
    }

    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    async fn extract(&self, path: &Path) -> Result<Option<OcrText>> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let text = if is_raster_image(&extension) {
            self.ocr_image(path).await?
        } else if extension == "pdf" {
            self.extract_pdf_text(path)?
        } else {
            warn!("unsupported file type for fallback OCR: .{}", extension);
            None
        };

        match text {
            Some(text) => Ok(Some(OcrText::unpaged(self.name(), text))),
            None => {
                warn!("no text extracted from {}", path.display());
                Ok(None)
            }
        }
    }

    /// Verify the `tesseract` binary is present and functional by running
    /// it against a trivial synthetic image.
    async fn check_available(&self) -> bool {
        match self.probe().await {
            Ok(version) => {
                info!("fallback OCR available: {}", version);
                true
            }
            Err(err) => {
                error!("fallback OCR test failed: {:?}", err);
                error!(
                    "make sure Tesseract is installed: \
                     https://github.com/tesseract-ocr/tesseract"
                );
                false
            }
        }
    }
}

impl LocalOcr {
    async fn probe(&self) -> Result<String> {
        let output = Command::new("tesseract")
            .arg("--version")
            .output()
            .await
            .context("cannot run tesseract")?;
        check_for_command_failure("tesseract", &output)?;
        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or("tesseract")
            .to_owned();

        // OCR a blank white image to make sure the engine actually works,
        // not just that the binary exists.
        let tmpdir = tempfile::TempDir::with_prefix("ocrmill-probe")?;
        let input_path = tmpdir.path().join("input.png");
        let blank = image::RgbImage::from_pixel(100, 50, image::Rgb([255, 255, 255]));
        blank.save(&input_path).context("cannot write probe image")?;
        run_tesseract(&input_path, tmpdir.path()).await?;

        Ok(version)
    }
}

/// Run `tesseract` on `input_path`, writing output under `work_dir`, and
/// return the extracted text.
async fn run_tesseract(input_path: &Path, work_dir: &Path) -> Result<String> {
    let output_base = work_dir.join("output");
    let output = Command::new("tesseract")
        .arg(input_path)
        .arg(&output_base)
        .args(["--oem", "3", "--psm", "6", "-l", TESSERACT_LANGUAGES])
        .output()
        .await
        .context("cannot run tesseract")?;
    check_for_command_failure("tesseract", &output)?;

    std::fs::read_to_string(output_base.with_extension("txt"))
        .context("cannot read tesseract output file")
}

/// Check whether a command exited successfully, capturing its output for
/// diagnostics if it didn't.
fn check_for_command_failure(command_name: &str, output: &Output) -> Result<()> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(
        command_name = command_name,
        output = %stderr,
        "standard error from command",
    );
    if output.status.success() {
        Ok(())
    } else if let Some(exit_code) = output.status.code() {
        Err(anyhow::anyhow!(
            "{} failed with exit code {}:\n{}",
            command_name,
            exit_code,
            stderr
        ))
    } else {
        Err(anyhow::anyhow!("{} was terminated by a signal", command_name))
    }
}

/// Strip blank lines and trim the rest, or `None` if nothing is left.
fn tidy_ocr_text(text: &str) -> Option<String> {
    let tidied = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if tidied.is_empty() { None } else { Some(tidied) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tidy_strips_blank_lines() {
        let raw = "  first line \n\n\n second line\n   \n";
        assert_eq!(
            tidy_ocr_text(raw).unwrap(),
            "first line\nsecond line"
        );
    }

    #[test]
    fn tidy_of_whitespace_is_none() {
        assert!(tidy_ocr_text("  \n \n").is_none());
        assert!(tidy_ocr_text("").is_none());
    }

    #[tokio::test]
    async fn unsupported_extension_yields_no_text() {
        let ocr = LocalOcr::new();
        let result = ocr.extract(Path::new("notes.txt")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn corrupt_pdf_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();
        let ocr = LocalOcr::new();
        assert!(ocr.extract(&path).await.is_err());
    }
}
