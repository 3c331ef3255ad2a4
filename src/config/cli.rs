use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the printpress binary.
#[derive(Debug, Parser)]
#[command(
    name = "printpress",
    version,
    about = "Render templates with JSON data and print them to PDF"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PRINTPRESS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Convert a single template file without starting the server.
    Render(RenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct BrowserOverrides {
    /// Path to the Chrome or Chromium executable.
    #[arg(long = "browser-executable", value_name = "PATH", value_hint = ValueHint::ExecutablePath)]
    pub executable: Option<PathBuf>,

    /// Launch the browser with `--no-sandbox`.
    #[arg(
        long = "browser-no-sandbox",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub no_sandbox: Option<bool>,

    /// Override the browser launch timeout.
    #[arg(long = "browser-launch-timeout-seconds", value_name = "SECONDS")]
    pub launch_timeout_seconds: Option<u64>,

    /// Override the timeout applied to each DevTools request.
    #[arg(long = "browser-request-timeout-seconds", value_name = "SECONDS")]
    pub request_timeout_seconds: Option<u64>,

    /// Override the overall time allowed to print one document.
    #[arg(long = "browser-print-timeout-seconds", value_name = "SECONDS")]
    pub print_timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub browser: BrowserOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the maximum request size for uploads in bytes.
    #[arg(long = "uploads-max-request-bytes", value_name = "BYTES")]
    pub uploads_max_request_bytes: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub browser: BrowserOverrides,

    /// Template file to render.
    #[arg(value_name = "TEMPLATE", value_hint = ValueHint::FilePath)]
    pub template: PathBuf,

    /// JSON file whose contents are bound to `data`.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub data: Option<PathBuf>,

    /// Where to write the result.
    #[arg(long, short, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// Write the rendered HTML instead of printing a PDF.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub html: bool,
}
