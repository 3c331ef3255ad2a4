//! Request-scoped documents that flow through a single conversion.

use std::str::Utf8Error;

use bytes::Bytes;
use serde_json::{Map, Value};

/// Leading bytes of every well-formed PDF file.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Template bytes exactly as they arrived in the upload.
#[derive(Debug, Clone)]
pub struct TemplateUpload {
    filename: Option<String>,
    bytes: Bytes,
}

impl TemplateUpload {
    pub fn new(filename: Option<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename,
            bytes: bytes.into(),
        }
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Borrow the template as UTF-8 text.
    pub fn decode(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }
}

/// Everything needed to produce one PDF.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub template: TemplateUpload,
    pub data: Value,
}

impl ConversionRequest {
    pub fn new(template: TemplateUpload, data: Value) -> Self {
        Self { template, data }
    }

    /// A request whose template receives an empty `data` object.
    pub fn without_data(template: TemplateUpload) -> Self {
        Self::new(template, Value::Object(Map::new()))
    }
}

/// HTML produced by rendering a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    html: String,
}

impl RenderedDocument {
    pub fn new(html: String) -> Self {
        Self { html }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn into_html(self) -> String {
        self.html
    }
}

/// Bytes returned by the browser's print-to-PDF call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfDocument {
    bytes: Bytes,
}

impl PdfDocument {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn has_pdf_signature(&self) -> bool {
        self.bytes.starts_with(PDF_SIGNATURE)
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// Page edge offsets in inches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    pub const ZERO: Margins = Margins {
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
        left: 0.0,
    };
}

/// Paper dimensions in inches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperSize {
    pub width: f64,
    pub height: f64,
}

impl PaperSize {
    pub const A4: PaperSize = PaperSize {
        width: 8.27,
        height: 11.7,
    };
}

/// Layout handed to the browser when printing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrintOptions {
    pub paper: PaperSize,
    pub margins: Margins,
    pub print_background: bool,
}

impl PrintOptions {
    /// A4, backgrounds on, no margins.
    pub const fn full_bleed_a4() -> Self {
        Self {
            paper: PaperSize::A4,
            margins: Margins::ZERO,
            print_background: true,
        }
    }
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self::full_bleed_a4()
    }
}
