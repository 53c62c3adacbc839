use std::ops::ControlFlow;
use std::path::Path;

use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

/// PDF points per inch; render scale is `dpi / POINTS_PER_INCH`.
const POINTS_PER_INCH: f32 = 72.0;

/// Read the text layer of every page, in page order. Pages whose content cannot be
/// decoded come back empty rather than failing the whole document.
pub fn read_text_layer(path: &Path) -> Result<Vec<String>, lopdf::Error> {
    let document = lopdf::Document::load(path)?;

    let pages = document
        .get_pages()
        .into_keys()
        .map(|number| match document.extract_text(&[number]) {
            Ok(text) => text,
            Err(err) => {
                debug!(page = number, error = %err, "page has no decodable text layer");
                String::new()
            }
        })
        .collect();

    Ok(pages)
}

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("rasterizer unavailable: {0}")]
    Unavailable(String),
    #[error("could not load document: {0}")]
    Document(String),
}

/// Renders PDF pages to images one at a time so callers can stop early.
pub trait PageRasterizer: Send + Sync {
    /// Visit rendered pages in order until `visit` breaks. Returns the number of pages
    /// handed to `visit`.
    fn for_each_page(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(usize, DynamicImage) -> ControlFlow<()>,
    ) -> Result<usize, RasterError>;
}

/// Page rasterizer backed by a dynamically bound pdfium library.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    dpi: f32,
}

impl PdfiumRasterizer {
    pub fn new(dpi: f32) -> Self {
        Self { dpi }
    }

    fn bind() -> Result<Pdfium, RasterError> {
        let bindings =
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|err| RasterError::Unavailable(err.to_string()))?;
        Ok(Pdfium::new(bindings))
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn for_each_page(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(usize, DynamicImage) -> ControlFlow<()>,
    ) -> Result<usize, RasterError> {
        let pdfium = Self::bind()?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|err| RasterError::Document(err.to_string()))?;

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi / POINTS_PER_INCH)
            .render_form_data(true)
            .render_annotations(true);

        let mut visited = 0;
        for (index, page) in document.pages().iter().enumerate() {
            let image = match page.render_with_config(&render_config) {
                Ok(bitmap) => bitmap.as_image(),
                Err(err) => {
                    warn!(page = index + 1, error = %err, "failed to render PDF page");
                    continue;
                }
            };

            visited += 1;
            if visit(index, image).is_break() {
                break;
            }
        }

        Ok(visited)
    }
}
