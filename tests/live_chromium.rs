//! Prints a real document through a local Chromium.
//!
//! - Set `PRINTPRESS_TEST_CHROME` to the browser binary, or rely on auto-detection.
//! - Marked `#[ignore]` so it only runs on machines with a browser installed.

use std::path::PathBuf;

use printpress::application::printer::PdfPrinter;
use printpress::config::BrowserSettings;
use printpress::domain::document::{PrintOptions, RenderedDocument};
use printpress::infra::browser::ChromiumPrinter;

fn settings() -> BrowserSettings {
    BrowserSettings {
        executable: std::env::var_os("PRINTPRESS_TEST_CHROME").map(PathBuf::from),
        ..BrowserSettings::default()
    }
}

#[tokio::test]
#[ignore]
async fn prints_html_to_pdf_with_real_browser() {
    let printer = ChromiumPrinter::new(settings());
    let document = RenderedDocument::new(
        "<html><body style=\"background:#c00\"><h1>Hello World</h1></body></html>".to_string(),
    );

    let pdf = printer
        .print(&document, &PrintOptions::full_bleed_a4())
        .await
        .expect("chromium should print");

    assert!(pdf.has_pdf_signature());
    assert!(pdf.len() > 512, "suspiciously small pdf: {} bytes", pdf.len());
}

#[tokio::test]
#[ignore]
async fn concurrent_prints_use_separate_browsers() {
    let printer = ChromiumPrinter::new(settings());
    let first = RenderedDocument::new("<p>first</p>".to_string());
    let second = RenderedDocument::new("<p>second</p>".to_string());
    let options = PrintOptions::full_bleed_a4();

    let (a, b) = tokio::join!(
        printer.print(&first, &options),
        printer.print(&second, &options)
    );

    assert!(a.expect("first print").has_pdf_signature());
    assert!(b.expect("second print").has_pdf_signature());
}
