//! Template-to-PDF conversion: decode, render, print.

use std::{str::Utf8Error, sync::Arc, time::Instant};

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    application::{
        printer::{PdfPrinter, PrintError},
        template::{self, TemplateError},
    },
    domain::document::{ConversionRequest, PdfDocument, PrintOptions, RenderedDocument},
};

const SOURCE: &str = "application::convert";

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("template is not valid UTF-8: {0}")]
    Decode(#[from] Utf8Error),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Print(#[from] PrintError),
}

impl ConvertError {
    /// Stable label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::Decode(_) => "decode_error",
            ConvertError::Template(_) => "render_error",
            ConvertError::Print(PrintError::Timeout(_)) => "timeout",
            ConvertError::Print(_) => "print_error",
        }
    }
}

pub struct ConversionService {
    printer: Arc<dyn PdfPrinter>,
    options: PrintOptions,
}

impl ConversionService {
    pub fn new(printer: Arc<dyn PdfPrinter>) -> Self {
        Self::with_options(printer, PrintOptions::full_bleed_a4())
    }

    pub fn with_options(printer: Arc<dyn PdfPrinter>, options: PrintOptions) -> Self {
        Self { printer, options }
    }

    /// Decode the template and evaluate it against the request payload.
    pub fn render(&self, request: &ConversionRequest) -> Result<RenderedDocument, ConvertError> {
        let source = request.template.decode()?;
        let html = template::render(source, &request.data)?;
        Ok(RenderedDocument::new(html))
    }

    /// Render the template and print the result to PDF.
    pub async fn convert(&self, request: ConversionRequest) -> Result<PdfDocument, ConvertError> {
        let started_at = Instant::now();
        let result = self.convert_inner(&request).await;
        let elapsed = started_at.elapsed();

        histogram!("printpress_conversion_ms").record(elapsed.as_secs_f64() * 1000.0);
        match &result {
            Ok(pdf) => {
                counter!("printpress_conversions_total", "outcome" => "ok").increment(1);
                info!(
                    target = SOURCE,
                    op = "convert",
                    result = "ok",
                    template = request.template.filename().unwrap_or(""),
                    template_bytes = request.template.len(),
                    pdf_bytes = pdf.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "document converted"
                );
            }
            Err(err) => {
                counter!("printpress_conversions_total", "outcome" => err.kind()).increment(1);
                // Failures are reported once by the caller.
                debug!(
                    target = SOURCE,
                    op = "convert",
                    result = err.kind(),
                    template = request.template.filename().unwrap_or(""),
                    template_bytes = request.template.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %err,
                    "document conversion failed"
                );
            }
        }

        result
    }

    async fn convert_inner(&self, request: &ConversionRequest) -> Result<PdfDocument, ConvertError> {
        let document = self.render(request)?;
        let pdf = self.printer.print(&document, &self.options).await?;
        if !pdf.has_pdf_signature() {
            return Err(PrintError::InvalidOutput(pdf.len()).into());
        }
        Ok(pdf)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::domain::document::TemplateUpload;

    #[derive(Default)]
    struct RecordingPrinter {
        seen: Mutex<Vec<(String, PrintOptions)>>,
    }

    #[async_trait]
    impl PdfPrinter for RecordingPrinter {
        async fn print(
            &self,
            document: &RenderedDocument,
            options: &PrintOptions,
        ) -> Result<PdfDocument, PrintError> {
            self.seen
                .lock()
                .expect("printer log lock")
                .push((document.html().to_string(), *options));
            Ok(PdfDocument::new(format!("%PDF-1.7\n{}", document.html())))
        }
    }

    /// Returns the given bytes, or a launch failure when there are none.
    struct FixedPrinter(Option<&'static [u8]>);

    #[async_trait]
    impl PdfPrinter for FixedPrinter {
        async fn print(
            &self,
            _document: &RenderedDocument,
            _options: &PrintOptions,
        ) -> Result<PdfDocument, PrintError> {
            self.0
                .map(PdfDocument::new)
                .ok_or_else(|| PrintError::launch("no chrome"))
        }
    }

    fn request(template: &str, data: serde_json::Value) -> ConversionRequest {
        ConversionRequest::new(
            TemplateUpload::new(Some("t.ejs".into()), template.to_string()),
            data,
        )
    }

    #[tokio::test]
    async fn convert_renders_then_prints_with_full_bleed_a4() {
        let printer = Arc::new(RecordingPrinter::default());
        let service = ConversionService::new(printer.clone());

        let pdf = service
            .convert(request("Hello <%= data.name %>", json!({ "name": "World" })))
            .await
            .expect("conversion succeeds");

        assert!(pdf.has_pdf_signature());
        let seen = printer.seen.lock().expect("printer log lock");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "Hello World");
        assert_eq!(seen[0].1, PrintOptions::full_bleed_a4());
    }

    #[tokio::test]
    async fn render_failure_never_reaches_printer() {
        let printer = Arc::new(RecordingPrinter::default());
        let service = ConversionService::new(printer.clone());

        let err = service
            .convert(request("<%= data.missing.field %>", json!({})))
            .await
            .expect_err("render fails");

        assert!(matches!(err, ConvertError::Template(_)), "{err:?}");
        assert_eq!(err.kind(), "render_error");
        assert!(printer.seen.lock().expect("printer log lock").is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_decode_error() {
        let service = ConversionService::new(Arc::new(RecordingPrinter::default()));
        let request = ConversionRequest::without_data(TemplateUpload::new(None, vec![0xc3, 0x28]));

        let err = service.convert(request).await.expect_err("decode fails");
        assert!(matches!(err, ConvertError::Decode(_)), "{err:?}");
    }

    #[tokio::test]
    async fn printer_errors_propagate() {
        let service = ConversionService::new(Arc::new(FixedPrinter(None)));

        let err = service
            .convert(request("ok", json!({})))
            .await
            .expect_err("print fails");
        assert!(matches!(err, ConvertError::Print(PrintError::Launch(_))), "{err:?}");
        assert_eq!(err.kind(), "print_error");
    }

    #[tokio::test]
    async fn output_without_pdf_signature_is_rejected() {
        let service = ConversionService::new(Arc::new(FixedPrinter(Some(b"<html></html>"))));

        let err = service
            .convert(request("ok", json!({})))
            .await
            .expect_err("bogus output");
        assert!(
            matches!(err, ConvertError::Print(PrintError::InvalidOutput(13))),
            "{err:?}"
        );
    }
}
