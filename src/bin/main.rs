//! Webdetector CLI - scan saved pages, watch them, read the detection log
//!
//!   webdetector scan <file>          → one scan, detections as JSON
//!   webdetector watch <file>         → scan, then rescan on every change
//!   webdetector list [--text]        → every stored detection
//!   webdetector export [path]        → write the log to web_grep_logs.json
//!   webdetector serve                → HTTP read surface for an overlay
//!
//! Output format:
//!   --json     Output raw JSON (default for non-tty)
//!   --pretty   Pretty-print JSON (default for tty)

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use webdetector::core::config::{DetectorConfig, ENV_NAMESPACE};
use webdetector::logging::init_logging;
use webdetector::{render_text, DetectionStore, Detector, Document, FileDocument, PatternSet};

const DEFAULT_EXPORT_PATH: &str = "web_grep_logs.json";
const DEFAULT_PORT: u16 = 8080;

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("webdetector {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let command = match opts.command.as_deref() {
        Some(cmd) => cmd,
        None => {
            print_usage();
            return;
        }
    };

    let result = tokio::runtime::Runtime::new()
        .context("failed to create runtime")
        .and_then(|rt| {
            rt.block_on(async {
                match command {
                    "scan" => cmd_scan(&opts).await,
                    "watch" => cmd_watch(&opts).await,
                    "list" | "ls" => cmd_list(&opts).await,
                    "export" => cmd_export(&opts).await,
                    "serve" => cmd_serve(&opts).await,
                    cmd => Err(anyhow!("Unknown command: {}", cmd)),
                }
            })
        });

    let pretty = opts.pretty || (!opts.json && std::io::stdout().is_terminal());
    match result {
        Ok(Value::String(text)) => print!("{}", text),
        Ok(output) => println!("{}", render_json(&output, pretty)),
        Err(e) => {
            let err = json!({"error": format!("{:#}", e)});
            eprintln!("{}", render_json(&err, pretty));
            std::process::exit(1);
        }
    }
}

fn render_json(value: &Value, pretty: bool) -> String {
    let rendered = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|_| value.to_string())
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    target: Option<String>,
    // Detector options
    config: Option<String>,
    patterns: Option<String>,
    namespace: Option<String>,
    root: Option<String>,
    url: Option<String>,
    debounce_ms: Option<u64>,
    poll_ms: Option<u64>,
    // Server options
    port: Option<u16>,
    // Output options
    text: bool,
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        // Load .env file if present
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    let value = value.trim().trim_matches('"');
                    if !value.is_empty() && env::var(key.trim()).is_err() {
                        env::set_var(key.trim(), value);
                    }
                }
            }
        }

        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        let value_at = |i: usize| args.get(i + 1).cloned();

        while i < args.len() {
            let arg = &args[i];
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--json" => opts.json = true,
                "--pretty" => opts.pretty = true,
                "--text" => opts.text = true,
                "--config" | "-c" => {
                    opts.config = value_at(i);
                    i += 1;
                }
                "--patterns" => {
                    opts.patterns = value_at(i);
                    i += 1;
                }
                "--namespace" | "-n" => {
                    opts.namespace = value_at(i);
                    i += 1;
                }
                "--root" | "-d" => {
                    opts.root = value_at(i);
                    i += 1;
                }
                "--url" | "-u" => {
                    opts.url = value_at(i);
                    i += 1;
                }
                "--debounce-ms" => {
                    opts.debounce_ms = value_at(i).and_then(|v| v.parse().ok());
                    i += 1;
                }
                "--poll-ms" => {
                    opts.poll_ms = value_at(i).and_then(|v| v.parse().ok());
                    i += 1;
                }
                "--port" | "-p" => {
                    opts.port = value_at(i).and_then(|v| v.parse().ok());
                    i += 1;
                }
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        // First positional is command, second its target
        let mut positional = positional.into_iter();
        opts.command = positional.next();
        opts.target = positional.next();

        // Server port from env
        if opts.port.is_none() {
            opts.port = env::var("WEBDETECTOR_PORT").ok().and_then(|s| s.parse().ok());
        }

        opts
    }
}

fn print_usage() {
    println!(
        r#"webdetector - credential indicators in page markup

USAGE:
    webdetector <command> [target] [options]

COMMANDS:
    scan <file>             Scan a saved page once
    watch <file>            Scan, then rescan whenever the file changes
    list [--text]           Print every stored detection
    export [path]           Write the log as JSON (default: {export})
    serve                   Start HTTP read surface

DETECTOR OPTIONS:
    --config, -c <file>     JSON config file
    --patterns <a,b,c>      Tokens to look for (env: WEBDETECTOR_PATTERNS)
    --namespace, -n <ns>    Storage namespace (env: {ns_env})
    --root, -d <dir>        Store directory (env: WEBDETECTOR_ROOT)
    --url, -u <url>         Source URL recorded for the page (default: file://...)
    --debounce-ms <ms>      Coalesce changes for this long before rescanning
    --poll-ms <ms>          File polling period for watch (default: 500)

SERVER OPTIONS:
    --port, -p <port>       Server port (default: {port}, env: WEBDETECTOR_PORT)

OUTPUT OPTIONS:
    --json                  Raw JSON output
    --pretty                Pretty-print JSON
    --text                  Overlay text layout (list only)
    --version, -V           Print version

EXAMPLES:
    webdetector scan saved/login.html --url https://app.example.com/login
    webdetector watch page.html --debounce-ms 200
    webdetector list --json | jq '.[].key'
    webdetector export findings.json
"#,
        export = DEFAULT_EXPORT_PATH,
        ns_env = ENV_NAMESPACE,
        port = DEFAULT_PORT,
    );
}

/// Defaults, then `--config`, then environment, then flags.
fn load_config(opts: &ParsedArgs) -> Result<DetectorConfig> {
    let mut config = match opts.config.as_deref() {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
            DetectorConfig::from_json(&raw).with_context(|| format!("parsing config {}", path))?
        }
        None => DetectorConfig::default(),
    }
    .apply_env();

    if let Some(list) = opts.patterns.as_deref() {
        config.patterns = PatternSet::from_csv(list);
    }
    if let Some(ns) = &opts.namespace {
        config.storage_namespace = ns.clone();
    }
    if let Some(ms) = opts.debounce_ms {
        config.debounce_ms = Some(ms);
    }
    if let Some(ms) = opts.poll_ms {
        config.poll_interval_ms = ms;
    }
    config.validate()?;
    debug!(?config, "config loaded");
    Ok(config)
}

/// Build the detector and open its store; a store that cannot open is an error here.
async fn load_detector(opts: &ParsedArgs) -> Result<Detector> {
    let config = load_config(opts)?;
    let store = match &opts.root {
        Some(root) => DetectionStore::file(config.storage_namespace.clone(), PathBuf::from(root)),
        None => DetectionStore::at_default_root(config.storage_namespace.clone())?,
    };
    let detector = Detector::new(config, store)?;
    detector.open().await.context("opening detection store")?;
    Ok(detector)
}

fn target_file(opts: &ParsedArgs) -> Result<PathBuf> {
    let path = PathBuf::from(opts.target.as_deref().ok_or_else(|| anyhow!("Missing <file> argument"))?);
    if !path.is_file() {
        bail!("Not a file: {}", path.display());
    }
    Ok(path)
}

fn open_document(opts: &ParsedArgs, detector: &Detector) -> Result<Arc<FileDocument>> {
    let path = target_file(opts)?;
    let poll = Duration::from_millis(detector.config().poll_interval_ms);
    Ok(Arc::new(FileDocument::open(path, opts.url.clone(), poll)))
}

async fn cmd_scan(opts: &ParsedArgs) -> Result<Value> {
    let detector = load_detector(opts).await?;
    let doc = open_document(opts, &detector)?;

    let report = detector.scan_once(&*doc).await;
    detector.flush().await;

    Ok(json!({
        "url": doc.url(),
        "detections": report.detections,
        "count": report.len(),
    }))
}

async fn cmd_watch(opts: &ParsedArgs) -> Result<Value> {
    use webdetector::install_signal_handlers;

    let detector = load_detector(opts).await?;
    let doc = open_document(opts, &detector)?;
    let shutdown = install_signal_handlers();

    let (first, handle) = detector.start(doc.clone()).await;
    info!(url = %doc.url(), matches = first.len(), "watching, Ctrl+C to stop");

    shutdown.wait().await;
    handle.dispose();
    detector.flush().await;

    let stored = detector.list_detections().await?;
    Ok(json!({
        "status": "stopped",
        "url": doc.url(),
        "stored": stored.len(),
    }))
}

async fn cmd_list(opts: &ParsedArgs) -> Result<Value> {
    let detector = load_detector(opts).await?;
    let records = detector.list_detections().await?;
    if opts.text {
        return Ok(Value::String(render_text(&records)));
    }
    Ok(serde_json::to_value(records)?)
}

async fn cmd_export(opts: &ParsedArgs) -> Result<Value> {
    let detector = load_detector(opts).await?;
    let records = detector.list_detections().await?;
    let path = opts.target.clone().unwrap_or_else(|| DEFAULT_EXPORT_PATH.to_string());

    let body = serde_json::to_string_pretty(&records)?;
    tokio::fs::write(&path, body).await.with_context(|| format!("writing {}", path))?;
    info!(path = %path, count = records.len(), "exported");

    Ok(json!({"path": path, "count": records.len()}))
}

async fn cmd_serve(opts: &ParsedArgs) -> Result<Value> {
    use webdetector::{create_router, install_signal_handlers};

    let port = opts.port.unwrap_or(DEFAULT_PORT);
    let detector = Arc::new(load_detector(opts).await?);
    let shutdown = install_signal_handlers();

    let router = create_router(detector);
    let addr = format!("0.0.0.0:{}", port);

    info!("webdetector listening on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /health              - Health check");
    info!("  GET  /detections          - All stored detections");
    info!("  GET  /overlay[/text]      - Overlay state or panel text");
    info!("  POST /overlay/toggle      - Show or hide the panel");
    debug!("  POST /overlay/font/{{increase,decrease}}");

    let listener = tokio::net::TcpListener::bind(&addr).await
        .with_context(|| format!("Failed to bind {}", addr))?;

    // Run server with graceful shutdown
    let mut shutdown_rx = shutdown.subscribe();
    tokio::select! {
        result = axum::serve(listener, router) => {
            result.context("Server error")?;
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received, stopping server...");
        }
    }

    Ok(json!({"status": "stopped"}))
}
