use std::{future::IntoFuture, path::Path, process, sync::Arc, time::Duration};

use printpress::{
    application::{
        convert::ConversionService,
        error::AppError,
        printer::PdfPrinter,
    },
    config,
    domain::document::{ConversionRequest, TemplateUpload},
    infra::{
        browser::ChromiumPrinter,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
    }
}

fn build_conversion_service(settings: &config::Settings) -> Arc<ConversionService> {
    let printer: Arc<dyn PdfPrinter> = Arc::new(ChromiumPrinter::new(settings.browser.clone()));
    Arc::new(ConversionService::new(printer))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let state = HttpState::new(build_conversion_service(&settings));
    let upload_body_limit = settings.uploads.max_request_bytes.get() as usize;
    let router = http::build_router(state, upload_body_limit);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "printpress::serve",
        addr = %settings.server.addr,
        upload_limit_bytes = upload_body_limit,
        "Listening"
    );

    let signalled = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(signalled.clone()))
        .into_future();

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = drain_deadline(signalled, grace) => {
            warn!(
                target = "printpress::serve",
                grace_seconds = grace.as_secs(),
                "In-flight requests did not finish before the shutdown deadline"
            );
        }
    }

    info!(target = "printpress::serve", "Server stopped");
    Ok(())
}

async fn wait_for_shutdown(signalled: Arc<Notify>) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!(target = "printpress::serve", "Shutdown signal received");
    signalled.notify_one();
}

async fn drain_deadline(signalled: Arc<Notify>, grace: Duration) {
    signalled.notified().await;
    tokio::time::sleep(grace).await;
}

async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let template = read_file(&args.template).await?;
    let filename = args
        .template
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    let upload = TemplateUpload::new(filename, template);

    let request = match args.data.as_deref() {
        Some(path) => {
            let raw = read_file(path).await?;
            let data: Value = serde_json::from_slice(&raw).map_err(|err| {
                AppError::unexpected(format!("`{}` is not valid JSON: {err}", path.display()))
            })?;
            ConversionRequest::new(upload, data)
        }
        None => ConversionRequest::without_data(upload),
    };

    let service = build_conversion_service(&settings);
    let output = if args.html {
        service.render(&request)?.into_html().into_bytes()
    } else {
        service.convert(request).await?.into_bytes().to_vec()
    };

    tokio::fs::write(&args.output, &output)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "printpress::render",
        output = %args.output.display(),
        bytes = output.len(),
        html = args.html,
        "Document written"
    );
    Ok(())
}

async fn read_file(path: &Path) -> Result<Vec<u8>, AppError> {
    tokio::fs::read(path)
        .await
        .map_err(|err| AppError::unexpected(format!("failed to read `{}`: {err}", path.display())))
}
