//! Text extraction routed by declared media type.
//!
//! PDFs are read through their text layer first and rasterized for OCR only when no page
//! carries text. Images go straight to OCR. Every failure is reported through
//! [`ExtractionMethod`] and the warning list; [`TextExtractor::extract`] never errors.

mod ocr;
mod pdf;

pub use ocr::{OcrEngine, OcrError, TesseractCli};
pub use pdf::{read_text_layer, PageRasterizer, PdfiumRasterizer, RasterError};

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use image::{ColorType, DynamicImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::round2;
use crate::config::OcrConfig;

/// Characters of text-layer or scanned-PDF output that count as full confidence.
const PDF_FULL_CONFIDENCE_CHARS: f64 = 200.0;
/// Characters of image OCR output that count as full confidence.
const IMAGE_FULL_CONFIDENCE_CHARS: f64 = 150.0;

pub(crate) const OCR_UNAVAILABLE_WARNING: &str =
    "Tesseract OCR is not installed. Install Tesseract to enable image/scanned-PDF extraction.";
const EMPTY_SCAN_WARNING: &str = "No text could be extracted from scanned PDF";

/// How the text of a document was obtained, or why it was not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    TextLayer,
    OcrImage,
    OcrPdf,
    Unavailable,
    Unsupported,
    Error,
}

impl ExtractionMethod {
    pub const fn label(self) -> &'static str {
        match self {
            ExtractionMethod::TextLayer => "text_layer",
            ExtractionMethod::OcrImage => "ocr_image",
            ExtractionMethod::OcrPdf => "ocr_pdf",
            ExtractionMethod::Unavailable => "unavailable",
            ExtractionMethod::Unsupported => "unsupported",
            ExtractionMethod::Error => "error",
        }
    }
}

/// Result of one extraction attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: usize,
    pub char_count: usize,
    pub method: ExtractionMethod,
    pub confidence: f64,
    pub warnings: Vec<String>,
}

impl ExtractedText {
    fn failure(method: ExtractionMethod, warning: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            page_count: 0,
            char_count: 0,
            method,
            confidence: 0.0,
            warnings: vec![warning.into()],
        }
    }

    fn from_text(
        text: String,
        page_count: usize,
        method: ExtractionMethod,
        full_confidence_chars: f64,
        warnings: Vec<String>,
    ) -> Self {
        let char_count = text.chars().count();
        Self {
            text,
            page_count,
            char_count,
            method,
            confidence: round2((char_count as f64 / full_confidence_chars).min(1.0)),
            warnings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Media types accepted for upload and extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Pdf,
    Jpeg,
    Png,
    Webp,
}

impl MediaType {
    pub const ALLOWED: [&'static str; 4] =
        ["application/pdf", "image/jpeg", "image/png", "image/webp"];

    /// Parse a declared media type, ignoring parameters such as `charset`.
    pub fn from_declared(declared: &str) -> Option<Self> {
        let parsed: mime::Mime = declared.trim().parse().ok()?;
        match (parsed.type_(), parsed.subtype().as_str()) {
            (mime::APPLICATION, "pdf") => Some(Self::Pdf),
            (mime::IMAGE, "jpeg") => Some(Self::Jpeg),
            (mime::IMAGE, "png") => Some(Self::Png),
            (mime::IMAGE, "webp") => Some(Self::Webp),
            _ => None,
        }
    }

    pub const fn essence(self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Webp => "image/webp",
        }
    }
}

/// Routes stored documents to the text layer reader or the OCR engine.
pub struct TextExtractor {
    ocr: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl TextExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self { ocr, rasterizer }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(
            Arc::new(TesseractCli::from_config(config)),
            Arc::new(PdfiumRasterizer::new(config.render_dpi)),
        )
    }

    pub fn extract(&self, path: &Path, declared_media_type: &str) -> ExtractedText {
        let extracted = match MediaType::from_declared(declared_media_type) {
            Some(MediaType::Pdf) => self.extract_pdf(path),
            Some(MediaType::Jpeg | MediaType::Png | MediaType::Webp) => self.extract_image(path),
            None => ExtractedText::failure(
                ExtractionMethod::Unsupported,
                format!("Unsupported MIME type: {declared_media_type}"),
            ),
        };

        debug!(
            path = %path.display(),
            method = extracted.method.label(),
            chars = extracted.char_count,
            "document text extracted"
        );
        extracted
    }

    fn extract_pdf(&self, path: &Path) -> ExtractedText {
        if !path.exists() {
            return ExtractedText::failure(
                ExtractionMethod::Error,
                format!("File not found: {}", path.display()),
            );
        }

        let pages = match read_text_layer(path) {
            Ok(pages) => pages,
            Err(err) => {
                return ExtractedText::failure(
                    ExtractionMethod::Error,
                    format!("Failed to open PDF: {err}"),
                )
            }
        };

        let pages: Vec<&str> = pages
            .iter()
            .map(|page| page.trim())
            .filter(|page| !page.is_empty())
            .collect();

        if pages.is_empty() {
            return self.ocr_pdf_pages(path);
        }

        ExtractedText::from_text(
            pages.join("\n\n"),
            pages.len(),
            ExtractionMethod::TextLayer,
            PDF_FULL_CONFIDENCE_CHARS,
            Vec::new(),
        )
    }

    fn extract_image(&self, path: &Path) -> ExtractedText {
        if !path.exists() {
            return ExtractedText::failure(
                ExtractionMethod::Error,
                format!("File not found: {}", path.display()),
            );
        }

        let image = match image::open(path) {
            Ok(image) => normalize_color(image),
            Err(err) => {
                return ExtractedText::failure(
                    ExtractionMethod::Error,
                    format!("Failed to open image: {err}"),
                )
            }
        };

        match self.ocr.recognize(&image) {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    let mut empty = ExtractedText::failure(
                        ExtractionMethod::OcrImage,
                        "OCR engine returned empty text",
                    );
                    empty.page_count = 1;
                    empty
                } else {
                    ExtractedText::from_text(
                        text.to_string(),
                        1,
                        ExtractionMethod::OcrImage,
                        IMAGE_FULL_CONFIDENCE_CHARS,
                        Vec::new(),
                    )
                }
            }
            Err(OcrError::Unavailable(reason)) => {
                warn!(%reason, "OCR engine unavailable");
                ExtractedText::failure(ExtractionMethod::Unavailable, OCR_UNAVAILABLE_WARNING)
            }
            Err(err @ OcrError::Failed(_)) => {
                warn!(error = %err, "OCR failed for image");
                ExtractedText::failure(ExtractionMethod::Unavailable, err.to_string())
            }
        }
    }

    fn ocr_pdf_pages(&self, path: &Path) -> ExtractedText {
        let mut page_texts: Vec<String> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        let rendered = self
            .rasterizer
            .for_each_page(path, &mut |index, image| {
                let page = index + 1;
                match self.ocr.recognize(&normalize_color(image)) {
                    Ok(text) => {
                        let text = text.trim();
                        if text.is_empty() {
                            warnings.push(format!("page {page}: OCR engine returned empty text"));
                        } else {
                            page_texts.push(text.to_string());
                        }
                        ControlFlow::Continue(())
                    }
                    Err(OcrError::Unavailable(reason)) => {
                        warn!(%reason, page, "OCR engine unavailable, skipping remaining pages");
                        warnings.push(OCR_UNAVAILABLE_WARNING.to_string());
                        ControlFlow::Break(())
                    }
                    Err(err @ OcrError::Failed(_)) => {
                        warnings.push(format!("page {page}: {err}"));
                        ControlFlow::Continue(())
                    }
                }
            });

        match rendered {
            Ok(pages) => debug!(pages, "scanned PDF pages rendered for OCR"),
            Err(RasterError::Unavailable(reason)) => {
                return ExtractedText::failure(
                    ExtractionMethod::Unavailable,
                    format!("PDF rasterizer is not available: {reason}"),
                )
            }
            Err(RasterError::Document(reason)) => {
                return ExtractedText::failure(
                    ExtractionMethod::Error,
                    format!("Failed to open PDF for OCR: {reason}"),
                )
            }
        }

        let page_count = page_texts.len();
        let full_text = page_texts.join("\n\n");
        if full_text.is_empty() {
            if !warnings.iter().any(|warning| warning == OCR_UNAVAILABLE_WARNING) {
                warnings.push(EMPTY_SCAN_WARNING.to_string());
            }
            return ExtractedText {
                text: full_text,
                page_count: 0,
                char_count: 0,
                method: ExtractionMethod::Unavailable,
                confidence: 0.0,
                warnings,
            };
        }

        ExtractedText::from_text(
            full_text,
            page_count,
            ExtractionMethod::OcrPdf,
            PDF_FULL_CONFIDENCE_CHARS,
            warnings,
        )
    }
}

/// Grayscale and RGB pass through; everything else (alpha, 16-bit, palette) becomes RGB.
fn normalize_color(image: DynamicImage) -> DynamicImage {
    match image.color() {
        ColorType::L8 | ColorType::Rgb8 => image,
        _ => DynamicImage::ImageRgb8(image.to_rgb8()),
    }
}
