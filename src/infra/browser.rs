//! Headless Chromium printing over the DevTools protocol.
//!
//! Every call to [`ChromiumPrinter::print`] launches its own browser with a
//! throwaway profile directory, prints one page and tears the process down
//! again. Nothing is shared between calls.

use std::{
    path::Path,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chromiumoxide::{
    browser::{Browser, BrowserConfig},
    cdp::browser_protocol::page::PrintToPdfParams,
};
use futures::StreamExt;
use metrics::{counter, histogram};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    application::printer::{PdfPrinter, PrintError},
    config::BrowserSettings,
    domain::document::{PdfDocument, PrintOptions, RenderedDocument},
};

const SOURCE: &str = "infra::browser";
const BLANK_PAGE: &str = "about:blank";
const PROFILE_PREFIX: &str = "printpress-profile-";

#[derive(Debug, Clone)]
pub struct ChromiumPrinter {
    settings: BrowserSettings,
}

impl ChromiumPrinter {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl PdfPrinter for ChromiumPrinter {
    async fn print(
        &self,
        document: &RenderedDocument,
        options: &PrintOptions,
    ) -> Result<PdfDocument, PrintError> {
        let started_at = Instant::now();
        let mut session = BrowserSession::launch(&self.settings).await?;

        let outcome = tokio::time::timeout(
            self.settings.print_timeout,
            session.print(document.html(), print_params(options)),
        )
        .await;

        session.shutdown().await;

        let bytes = match outcome {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    target = SOURCE,
                    op = "browser::print",
                    result = "timeout",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "Browser did not finish printing in time"
                );
                return Err(PrintError::Timeout(self.settings.print_timeout));
            }
        };

        let elapsed = started_at.elapsed();
        histogram!("printpress_print_ms").record(elapsed.as_secs_f64() * 1000.0);
        info!(
            target = SOURCE,
            op = "browser::print",
            result = "ok",
            elapsed_ms = elapsed.as_millis() as u64,
            html_bytes = document.html().len(),
            pdf_bytes = bytes.len(),
            "Document printed"
        );

        Ok(PdfDocument::new(bytes))
    }
}

/// One browser process plus the task pumping its DevTools connection.
///
/// [`BrowserSession::shutdown`] closes the browser, killing it when it does
/// not cooperate. If the session
/// is dropped without it (for example when the request future is cancelled),
/// the handler task is aborted and the driver kills the child process.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    exit_timeout: Duration,
    // Held so the profile directory outlives the browser process.
    _profile: TempDir,
}

impl BrowserSession {
    async fn launch(settings: &BrowserSettings) -> Result<Self, PrintError> {
        let profile = tempfile::Builder::new()
            .prefix(PROFILE_PREFIX)
            .tempdir()
            .map_err(|err| {
                PrintError::launch(format!("failed to create profile directory: {err}"))
            })?;

        let config = browser_config(settings, profile.path())?;
        let (browser, mut handler) = Browser::launch(config).await.map_err(|err| {
            warn!(
                target = SOURCE,
                op = "browser::launch",
                result = "error",
                error = %err,
                "Failed to launch headless browser"
            );
            PrintError::launch(err.to_string())
        })?;
        counter!("printpress_browser_launches_total").increment(1);

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target = SOURCE, error = %err, "DevTools handler error");
                }
            }
        });

        debug!(
            target = SOURCE,
            op = "browser::launch",
            profile = %profile.path().display(),
            "Headless browser started"
        );

        Ok(Self {
            browser,
            handler,
            exit_timeout: settings.request_timeout,
            _profile: profile,
        })
    }

    async fn print(&self, html: &str, params: PrintToPdfParams) -> Result<Vec<u8>, PrintError> {
        let page = self
            .browser
            .new_page(BLANK_PAGE)
            .await
            .map_err(|err| PrintError::page(err.to_string()))?;
        page.set_content(html)
            .await
            .map_err(|err| PrintError::content(err.to_string()))?;
        page.pdf(params)
            .await
            .map_err(|err| PrintError::print(err.to_string()))
    }

    async fn shutdown(&mut self) {
        teardown(&mut self.browser, self.exit_timeout).await;
        self.handler.abort();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// The teardown surface of a running browser process.
#[async_trait]
trait BrowserProcess: Send {
    async fn close(&mut self) -> Result<(), String>;
    async fn kill(&mut self) -> Result<(), String>;
    async fn wait(&mut self) -> Result<(), String>;
}

#[async_trait]
impl BrowserProcess for Browser {
    async fn close(&mut self) -> Result<(), String> {
        Browser::close(self)
            .await
            .map(drop)
            .map_err(|err| err.to_string())
    }

    async fn kill(&mut self) -> Result<(), String> {
        match Browser::kill(self).await {
            Some(Err(err)) => Err(err.to_string()),
            _ => Ok(()),
        }
    }

    async fn wait(&mut self) -> Result<(), String> {
        Browser::wait(self)
            .await
            .map(drop)
            .map_err(|err| err.to_string())
    }
}

/// Ask the browser to close, then reap it.
///
/// A browser that refuses to close, or that has not exited within
/// `exit_timeout`, is killed. This never waits on the process unbounded.
async fn teardown<P: BrowserProcess + ?Sized>(process: &mut P, exit_timeout: Duration) {
    let closed = match tokio::time::timeout(exit_timeout, process.close()).await {
        Ok(result) => result,
        Err(_) => Err(format!("no reply within {}s", exit_timeout.as_secs_f64())),
    };
    if let Err(err) = closed {
        warn!(
            target = SOURCE,
            op = "browser::shutdown",
            error = %err,
            "Failed to close browser cleanly, killing it"
        );
        force_kill(process).await;
    }

    match tokio::time::timeout(exit_timeout, process.wait()).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            warn!(
                target = SOURCE,
                op = "browser::shutdown",
                error = %err,
                "Failed to reap browser process"
            );
        }
        Err(_) => {
            warn!(
                target = SOURCE,
                op = "browser::shutdown",
                timeout_ms = exit_timeout.as_millis() as u64,
                "Browser did not exit in time, killing it"
            );
            force_kill(process).await;
        }
    }
}

async fn force_kill<P: BrowserProcess + ?Sized>(process: &mut P) {
    if let Err(err) = process.kill().await {
        warn!(
            target = SOURCE,
            op = "browser::kill",
            error = %err,
            "Failed to kill browser process"
        );
    }
}

fn browser_config(settings: &BrowserSettings, profile: &Path) -> Result<BrowserConfig, PrintError> {
    let mut builder = BrowserConfig::builder()
        .user_data_dir(profile)
        .launch_timeout(settings.launch_timeout)
        .request_timeout(settings.request_timeout)
        .arg("--disable-gpu")
        .arg("--disable-dev-shm-usage");

    if settings.no_sandbox {
        builder = builder.no_sandbox();
    }
    if let Some(executable) = settings.executable.as_ref() {
        builder = builder.chrome_executable(executable);
    }
    for arg in &settings.args {
        builder = builder.arg(arg.as_str());
    }

    builder.build().map_err(PrintError::launch)
}

fn print_params(options: &PrintOptions) -> PrintToPdfParams {
    PrintToPdfParams {
        print_background: Some(options.print_background),
        paper_width: Some(options.paper.width),
        paper_height: Some(options.paper.height),
        margin_top: Some(options.margins.top),
        margin_right: Some(options.margins.right),
        margin_bottom: Some(options.margins.bottom),
        margin_left: Some(options.margins.left),
        ..Default::default()
    }
}
