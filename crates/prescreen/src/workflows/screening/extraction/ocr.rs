use std::io::{Cursor, ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use image::{DynamicImage, ImageFormat};

use crate::config::OcrConfig;

/// OCR failure modes. `Unavailable` means no page of any document can be recognized.
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),
    #[error("OCR failed: {0}")]
    Failed(String),
}

/// Recognizes text in a rendered page or photographed document.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError>;
}

/// Tesseract driven through its command line: PNG bytes on stdin, text on stdout.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    command: PathBuf,
    languages: String,
}

impl TesseractCli {
    pub fn new(command: impl Into<PathBuf>, languages: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            languages: languages.into(),
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(config.resolve_tesseract_cmd(), config.languages.clone())
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|err| OcrError::Failed(format!("could not encode page image: {err}")))?;

        let mut child = Command::new(&self.command)
            .args(["stdin", "stdout", "-l"])
            .arg(&self.languages)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => OcrError::Unavailable(format!(
                    "{}: {err}",
                    self.command.display()
                )),
                _ => OcrError::Failed(err.to_string()),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&png)
                .map_err(|err| OcrError::Failed(format!("could not stream image: {err}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|err| OcrError::Failed(err.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("Failed loading language") {
                return Err(OcrError::Unavailable(stderr));
            }
            return Err(OcrError::Failed(format!(
                "tesseract exited with {}: {stderr}",
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
