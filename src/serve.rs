//! Development server with live reload support.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   ┌──────────────────┐   ┌─────────────────┐
//! │   Main Thread   │   │  Notify Thread   │   │   Build Loop    │
//! │  (HTTP Server)  │   │  (File Monitor)  │   │ (debounce+build)│
//! └────────┬────────┘   └────────┬─────────┘   └────────┬────────┘
//!          │                     │ touch()              │ notify_all()
//!          ▼                     ▼                      ▼
//!   static files from      BuildTrigger  ──────▶  LiveReloadBroker
//!   config.build.output                                 │
//!          │                                            ▼
//!          └──── /__livereload ──▶ one thread per SSE client
//! ```

use crate::{
    config::SiteConfig,
    log,
    reload::{self, LiveReloadBroker},
    site::SiteBuilder,
    watch::{BuildLoop, BuildTrigger, ChangeWatcher},
};
use anyhow::{Context, Result};
use std::{
    fs,
    io::{Cursor, ErrorKind, Write},
    net::{IpAddr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Endpoint the injected client script subscribes to.
const LIVERELOAD_PATH: &str = "/__livereload";

const LIVERELOAD_SCRIPT: &str = r#"<script>
(function () {
  var source = new EventSource("/__livereload");
  source.onmessage = function (event) {
    if (event.data === "reload") {
      source.close();
      location.reload();
    }
  };
})();
</script>
"#;

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Server Entry Point
// ============================================================================

/// Serve the output directory, rebuilding and reloading on change.
///
/// Blocks until Ctrl+C. The initial build is the caller's job.
pub fn serve_site(builder: SiteBuilder) -> Result<()> {
    let config = builder.config().clone();
    let interface: IpAddr = config
        .serve
        .interface
        .parse()
        .with_context(|| format!("Invalid interface '{}'", config.serve.interface))?;

    let (server, addr) = try_bind_port(interface, config.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);
    let broker = Arc::new(LiveReloadBroker::new());
    let running = Arc::new(AtomicBool::new(true));

    let server_for_signal = Arc::clone(&server);
    let broker_for_signal = Arc::clone(&broker);
    let running_for_signal = Arc::clone(&running);
    ctrlc::set_handler(move || {
        match broker_for_signal.clients() {
            0 => log!("serve"; "shutting down..."),
            n => log!("serve"; "shutting down, closing {n} live-reload client(s)..."),
        }
        running_for_signal.store(false, Ordering::SeqCst);
        broker_for_signal.close_all();
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{addr}");

    // Held for the lifetime of the server; dropping it stops watching.
    let _watcher = if config.serve.watch {
        let trigger = Arc::new(BuildTrigger::new());
        let watcher = ChangeWatcher::start(&config, Arc::clone(&trigger))?;
        spawn_build_loop(builder, trigger, Arc::clone(&broker), Arc::clone(&running), &config);
        Some(watcher)
    } else {
        None
    };

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &config, &broker) {
            log!("serve"; "request error: {e}");
        }
    }

    running.store(false, Ordering::SeqCst);
    Ok(())
}

fn spawn_build_loop(
    builder: SiteBuilder,
    trigger: Arc<BuildTrigger>,
    broker: Arc<LiveReloadBroker>,
    running: Arc<AtomicBool>,
    config: &SiteConfig,
) {
    let build_loop = BuildLoop::new(
        trigger,
        broker,
        config.serve.debounce(),
        config.serve.poll_interval(),
        move || builder.build().map(|_| ()),
    );
    thread::spawn(move || build_loop.run(&running));
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {base_port} in use, using {port} instead");
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind after {max_retries} attempts (ports {base_port}-{}): {}",
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

#[derive(Debug, PartialEq, Eq)]
enum Resolved {
    File(PathBuf),
    Forbidden,
    NotFound,
}

/// Strip the query, URL-decode, and map a request path onto `serve_root`.
///
/// Resolution order: exact file, then `<dir>/index.html`, then 404.
fn resolve(serve_root: &Path, raw_url: &str) -> Resolved {
    let without_query = raw_url.split(['?', '#']).next().unwrap_or_default();
    let Ok(decoded) = urlencoding::decode(without_query) else {
        return Resolved::NotFound;
    };

    let request_path = Path::new(decoded.trim_start_matches('/'));
    if request_path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Resolved::Forbidden;
    }

    let local_path = serve_root.join(request_path);
    if local_path.is_file() {
        return Resolved::File(local_path);
    }

    let index_path = local_path.join("index.html");
    if index_path.is_file() {
        return Resolved::File(index_path);
    }

    Resolved::NotFound
}

fn handle_request(request: Request, config: &SiteConfig, broker: &Arc<LiveReloadBroker>) -> Result<()> {
    let path = request.url().split('?').next().unwrap_or_default();
    if path == LIVERELOAD_PATH {
        spawn_event_stream(request, Arc::clone(broker), config.serve.keepalive());
        return Ok(());
    }

    match resolve(&config.build.output, request.url()) {
        Resolved::File(path) => serve_file(request, &path),
        Resolved::Forbidden => serve_status(request, 403, "403 Forbidden"),
        Resolved::NotFound => serve_status(request, 404, "404 Not Found"),
    }
}

/// Hand the raw connection to a thread that streams reload events.
fn spawn_event_stream(request: Request, broker: Arc<LiveReloadBroker>, keepalive: Duration) {
    thread::spawn(move || {
        let mut writer = request.into_writer();
        let result = writer
            .write_all(
                b"HTTP/1.1 200 OK\r\n\
                  Content-Type: text/event-stream\r\n\
                  Cache-Control: no-cache\r\n\
                  Connection: keep-alive\r\n\r\n",
            )
            .and_then(|()| reload::stream(&broker, &mut writer, keepalive));

        // A closed tab shows up as a broken pipe.
        match result {
            Err(e) if !matches!(e.kind(), ErrorKind::BrokenPipe | ErrorKind::ConnectionReset) => {
                log!("reload"; "stream error: {e}");
            }
            _ => {}
        }
    });
}

// ============================================================================
// Response Helpers
// ============================================================================

fn content_type_header(value: &str) -> Result<Header> {
    Header::from_bytes("Content-Type", value)
        .map_err(|()| anyhow::anyhow!("Invalid Content-Type header: {value}"))
}

fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let content_type = guess_content_type(path);

    let content = if content_type.starts_with("text/html") {
        inject_livereload(content)
    } else {
        content
    };

    let response = Response::from_data(content).with_header(content_type_header(content_type)?);
    request.respond(response)?;
    Ok(())
}

fn serve_status(request: Request, code: u16, body: &str) -> Result<()> {
    let response = Response::new(
        StatusCode(code),
        vec![content_type_header("text/plain; charset=utf-8")?],
        Cursor::new(body.as_bytes().to_vec()),
        Some(body.len()),
        None,
    );
    request.respond(response)?;
    Ok(())
}

/// Insert the client script before the last `</body>`, or append it.
fn inject_livereload(mut html: Vec<u8>) -> Vec<u8> {
    const CLOSE_BODY: &[u8] = b"</body>";

    let at = html
        .windows(CLOSE_BODY.len())
        .rposition(|w| w.eq_ignore_ascii_case(CLOSE_BODY))
        .unwrap_or(html.len());
    html.splice(at..at, LIVERELOAD_SCRIPT.bytes());
    html
}

/// Guess MIME content type from file extension.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("atom") => "application/atom+xml; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",

        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
