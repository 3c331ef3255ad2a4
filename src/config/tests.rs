use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_are_applied() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:3000");
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(
        settings.uploads.max_request_bytes.get(),
        DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES
    );
    assert!(settings.browser.executable.is_none());
    assert!(settings.browser.no_sandbox);
    assert_eq!(settings.browser.launch_timeout, Duration::from_secs(20));
    assert_eq!(settings.browser.request_timeout, Duration::from_secs(30));
    assert_eq!(settings.browser.print_timeout, Duration::from_secs(60));
    assert!(settings.browser.args.is_empty());
}

#[test]
fn uploads_limit_can_be_overridden_via_cli() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        uploads_max_request_bytes: Some(1_572_864),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.uploads.max_request_bytes.get(), 1_572_864);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(0);
    let err = Settings::from_raw(raw).expect_err("port zero");
    assert!(matches!(err, LoadError::Invalid { key: "server.port", .. }));

    let mut raw = RawSettings::default();
    raw.browser.print_timeout_seconds = Some(0);
    let err = Settings::from_raw(raw).expect_err("print timeout zero");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "browser.print_timeout_seconds",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.uploads.max_request_bytes = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn invalid_log_level_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("chatty".to_string());
    let err = Settings::from_raw(raw).expect_err("bad level");
    assert!(matches!(err, LoadError::Invalid { key: "logging.level", .. }));
}

#[test]
fn empty_browser_executable_is_rejected() {
    let mut raw = RawSettings::default();
    raw.browser.executable = Some(PathBuf::new());
    let err = Settings::from_raw(raw).expect_err("empty path");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "browser.executable",
            ..
        }
    ));
}

#[test]
fn browser_args_are_trimmed() {
    let mut raw = RawSettings::default();
    raw.browser.args = Some(vec![
        " --disable-gpu ".to_string(),
        String::new(),
        "--font-render-hinting=none".to_string(),
    ]);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.browser.args,
        vec!["--disable-gpu", "--font-render-hinting=none"]
    );
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["printpress"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "printpress",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--browser-no-sandbox",
        "false",
        "--browser-print-timeout-seconds",
        "15",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(serve.overrides.browser.no_sandbox, Some(false));

            let mut raw = RawSettings::default();
            raw.apply_serve_overrides(&serve.overrides);
            let settings = Settings::from_raw(raw).expect("valid settings");
            assert!(!settings.browser.no_sandbox);
            assert_eq!(settings.browser.print_timeout, Duration::from_secs(15));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_render_arguments() {
    let args = CliArgs::parse_from([
        "printpress",
        "render",
        "invoice.ejs",
        "--data",
        "invoice.json",
        "-o",
        "/tmp/invoice.pdf",
        "--browser-executable",
        "/usr/bin/chromium",
    ]);

    match args.command.expect("render command") {
        Command::Render(render) => {
            assert_eq!(render.template, std::path::Path::new("invoice.ejs"));
            assert_eq!(
                render.data.as_deref(),
                Some(std::path::Path::new("invoice.json"))
            );
            assert_eq!(render.output, std::path::Path::new("/tmp/invoice.pdf"));
            assert!(!render.html);
            assert_eq!(
                render.browser.executable.as_deref(),
                Some(std::path::Path::new("/usr/bin/chromium"))
            );
        }
        _ => panic!("wrong command parsed"),
    }
}
