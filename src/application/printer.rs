use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::document::{PdfDocument, PrintOptions, RenderedDocument};

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("failed to open browser page: {0}")]
    Page(String),
    #[error("failed to load document into page: {0}")]
    Content(String),
    #[error("print to PDF failed: {0}")]
    Print(String),
    #[error("printing did not finish within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("browser returned {0} bytes without a PDF signature")]
    InvalidOutput(usize),
}

impl PrintError {
    pub fn launch(message: impl Into<String>) -> Self {
        Self::Launch(message.into())
    }

    pub fn page(message: impl Into<String>) -> Self {
        Self::Page(message.into())
    }

    pub fn content(message: impl Into<String>) -> Self {
        Self::Content(message.into())
    }

    pub fn print(message: impl Into<String>) -> Self {
        Self::Print(message.into())
    }
}

/// Turns rendered HTML into PDF bytes.
///
/// Implementations own whatever process or connection they need for a single
/// call and must release it before returning, on success and on failure.
#[async_trait]
pub trait PdfPrinter: Send + Sync {
    async fn print(
        &self,
        document: &RenderedDocument,
        options: &PrintOptions,
    ) -> Result<PdfDocument, PrintError>;
}
