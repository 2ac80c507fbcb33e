use std::io;
use std::net::TcpListener;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    response::Response,
    Router,
};
use tokio::signal;
use tower_http::compression::CompressionLayer;

use crate::controller::Controller;
use crate::fetch::{DirSource, LoadError};
use crate::location::{self, Location};
use crate::markdown::Renderer;
use crate::page::{self, PageSurface};
use crate::registry::Registry;
use crate::web_assets;

/// Maximum number of consecutive ports to try before giving up.
const MAX_PORT_ATTEMPTS: u16 = 100;

/// Path of the viewer page.
const HOME_PATH: &str = "/";

/// Shared application state passed to all request handlers via `Arc<AppState>`.
pub struct AppState {
    /// Directory the documents are served and fetched from.
    pub source: DirSource,
    pub registry: Arc<Registry>,
    pub renderer: Option<Renderer>,
}

/// Options for [`run_serve`], collected from the command line.
pub struct ServeOptions {
    pub bind: String,
    pub port: u16,
    pub registry: Registry,
    pub renderer: Option<Renderer>,
}

/// Attempt to bind a TCP listener on `bind_addr` starting at `start_port`.
///
/// On `EADDRINUSE` the port is incremented by one and the attempt is retried up
/// to `MAX_PORT_ATTEMPTS` times.  Any other OS error causes an immediate failure
/// without further retries.
pub fn bind_with_retry(bind_addr: &str, start_port: u16) -> Result<(TcpListener, u16), String> {
    let mut port = start_port;
    eprintln!("[bind] trying port={}", port);
    for _ in 0..MAX_PORT_ATTEMPTS {
        let addr = format!("{}:{}", bind_addr, port);
        match TcpListener::bind(&addr) {
            Ok(listener) => {
                eprintln!("[bind] success port={}", port);
                return Ok((listener, port));
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                let next = port.wrapping_add(1);
                eprintln!("[bind] EADDRINUSE, trying {}", next);
                port = next;
            }
            Err(e) => {
                return Err(format!("bind {}:{} failed: {}", bind_addr, port, e));
            }
        }
    }
    Err(format!(
        "exhausted {} port candidates starting at {}; all ports in use",
        MAX_PORT_ATTEMPTS, start_port,
    ))
}

/// Derive the `Content-Type` value from a file extension (case-insensitive).
///
/// Returns `application/octet-stream` for any unrecognised extension so that
/// browsers never perform MIME sniffing on unknown types.
pub fn mime_for_ext(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "md" | "markdown" => "text/markdown; charset=utf-8",
        "html" | "htm" => "text/html; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "css" => "text/css",
        "js" => "text/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn status_text(code: StatusCode) -> &'static str {
    code.canonical_reason().unwrap_or("Error")
}

/// Plain-text failure response for a raw file request.
fn error_response(err: &LoadError) -> Response {
    let code = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Response::builder()
        .status(code)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header("X-Content-Type-Options", "nosniff")
        .body(Body::from(status_text(code)))
        .expect("error_response builder is infallible")
}

// ---------------------------------------------------------------------------
// Axum request handlers
// ---------------------------------------------------------------------------

/// Render the viewer page.
///
/// `?doc=<file>` stands in for the `#<file>` deep link: a fresh controller is
/// started at that fragment and its initial-load reaction runs before the
/// page is built. Unregistered names leave the viewer closed.
async fn page_handler(state: &AppState, query: &str) -> Response {
    let doc = location::query_param(query, "doc").unwrap_or_default();
    let mut controller = Controller::new(
        Arc::clone(&state.registry),
        &state.source,
        state.renderer,
        PageSurface::default(),
        Location::new(HOME_PATH, &location::percent_encode_component(&doc)),
    );
    let outcome = controller.handle_initial_load().await;
    eprintln!("[request] path={HOME_PATH} mode=page doc={doc:?} outcome={outcome:?}");

    let page = page::build_page_shell(controller.registry(), controller.surface(), HOME_PATH);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .header("X-Content-Type-Options", "nosniff")
        .body(Body::from(page))
        .expect("page response builder is infallible")
}

/// Serve a file from the document directory as-is.
async fn file_handler(state: &AppState, raw_path: &str) -> Response {
    let decoded = match location::percent_decode(raw_path) {
        Ok(d) => d,
        Err(_) => {
            eprintln!("[resolve] path={raw_path} branch=denied reason=invalid-percent-encoding");
            return error_response(&LoadError::Status {
                file: raw_path.to_owned(),
                code: 404,
                reason: "Not Found".to_owned(),
            });
        }
    };

    let (resolved, bytes) = match state.source.read_bytes(decoded.trim_start_matches('/')).await {
        Ok(r) => r,
        Err(e) => return error_response(&e),
    };

    let ext = resolved
        .path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    eprintln!("[request] path={decoded} mode=file size={}", resolved.size);

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_for_ext(ext))
        .header("X-Content-Type-Options", "nosniff");
    if let Some(modified) = resolved.modified {
        builder = builder.header(header::LAST_MODIFIED, httpdate::fmt_http_date(modified));
    }
    builder
        .body(Body::from(bytes))
        .expect("file response builder is infallible")
}

/// Main request handler.
///
/// 1. `/assets/docview.css` is served from the embedded constant.
/// 2. `/` and `/index.html` render the viewer page.
/// 3. Every other path is a raw file below the document directory.
///
/// All responses include `X-Content-Type-Options: nosniff`.
async fn serve_handler(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let raw_path = req.uri().path().to_owned();
    let query = req.uri().query().unwrap_or("").to_owned();

    if raw_path == "/assets/docview.css" {
        eprintln!("[request] path={raw_path} mode=asset");
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/css; charset=utf-8")
            .header("X-Content-Type-Options", "nosniff")
            .body(Body::from(web_assets::CSS))
            .expect("css asset response builder is infallible");
    }

    if raw_path == HOME_PATH || raw_path == "/index.html" {
        return page_handler(&state, &query).await;
    }

    file_handler(&state, &raw_path).await
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Serve the documents in `dir` and the viewer page.
///
/// Binds to `options.bind` starting at `options.port`, retrying on
/// `EADDRINUSE` up to 100 times.  The server shuts down cleanly when SIGINT
/// (Ctrl+C) is received.
pub async fn run_serve(dir: String, options: ServeOptions) -> io::Result<()> {
    let source = DirSource::new(&dir).map_err(|e| {
        eprintln!("Error: cannot serve '{dir}': {e}");
        e
    })?;

    let state = Arc::new(AppState {
        source,
        registry: Arc::new(options.registry),
        renderer: options.renderer,
    });

    let (std_listener, bound_port) =
        bind_with_retry(&options.bind, options.port).map_err(|msg| {
            eprintln!("Error: {}", msg);
            io::Error::new(io::ErrorKind::AddrInUse, msg)
        })?;

    std_listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(std_listener)?;

    let app = Router::new()
        .fallback(serve_handler)
        .layer(CompressionLayer::new())
        .with_state(state);

    println!("docview serving {dir} at http://{}:{}/", options.bind, bound_port);
    eprintln!("[serve] listening on {}:{}", options.bind, bound_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                eprintln!("[shutdown] failed to install SIGINT handler: {e}");
                std::future::pending::<()>().await;
            }
            eprintln!("[shutdown] complete");
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn app_state(files: &[(&str, &str)]) -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in files {
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        let state = AppState {
            source: DirSource::new(dir.path()).unwrap(),
            registry: Arc::new(Registry::default()),
            renderer: Some(Renderer::Comrak),
        };
        (dir, state)
    }

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // --- mime_for_ext ---

    #[test]
    fn mime_markdown_extensions() {
        assert_eq!(mime_for_ext("md"), "text/markdown; charset=utf-8");
        assert_eq!(mime_for_ext("MD"), "text/markdown; charset=utf-8");
        assert_eq!(mime_for_ext("markdown"), "text/markdown; charset=utf-8");
    }

    #[test]
    fn mime_images() {
        assert_eq!(mime_for_ext("png"), "image/png");
        assert_eq!(mime_for_ext("jpg"), "image/jpeg");
        assert_eq!(mime_for_ext("svg"), "image/svg+xml");
    }

    #[test]
    fn mime_unknown_extension_is_octet_stream() {
        assert_eq!(mime_for_ext("xyz"), "application/octet-stream");
        assert_eq!(mime_for_ext(""), "application/octet-stream");
    }

    // --- bind_with_retry ---

    #[test]
    fn bind_skips_port_in_use() {
        let (first, port) = bind_with_retry("127.0.0.1", 0).unwrap();
        let taken = first.local_addr().unwrap().port();
        assert_eq!(port, 0);
        let (_second, next) = bind_with_retry("127.0.0.1", taken).unwrap();
        assert_ne!(next, taken);
    }

    // --- handlers ---

    #[tokio::test]
    async fn home_page_has_hidden_viewer() {
        let (_dir, state) = app_state(&[]);
        let resp = page_handler(&state, "").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_text(resp).await;
        assert!(body.contains("class=\"document-viewer hidden\""));
    }

    #[tokio::test]
    async fn doc_query_opens_registered_document() {
        let (_dir, state) = app_state(&[("DMS.md", "# DMS\n")]);
        let body = body_text(page_handler(&state, "doc=DMS.md").await).await;
        assert!(body.contains("class=\"document-viewer\""));
        assert!(body.contains(">DMS Platform Infrastructure Automation</h2>"));
        assert!(body.contains("<h1>"));
    }

    #[tokio::test]
    async fn doc_query_for_unregistered_file_stays_home() {
        let (_dir, state) = app_state(&[("notes.md", "# Notes\n")]);
        let body = body_text(page_handler(&state, "doc=notes.md").await).await;
        assert!(body.contains("class=\"document-viewer hidden\""));
    }

    #[tokio::test]
    async fn doc_query_for_missing_file_shows_error_panel() {
        let (_dir, state) = app_state(&[]);
        let body = body_text(page_handler(&state, "doc=Velocity.md").await).await;
        assert!(body.contains("Failed to load Velocity.md: Not Found"));
        assert!(body.contains("Go Back"));
    }

    #[tokio::test]
    async fn file_handler_serves_raw_markdown() {
        let (_dir, state) = app_state(&[("DMS.md", "# DMS\n")]);
        let resp = file_handler(&state, "/DMS.md").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/markdown; charset=utf-8"
        );
        assert!(resp.headers().get(header::LAST_MODIFIED).is_some());
        assert_eq!(body_text(resp).await, "# DMS\n");
    }

    #[tokio::test]
    async fn file_handler_decodes_path() {
        let (_dir, state) = app_state(&[("release notes.md", "notes")]);
        let resp = file_handler(&state, "/release%20notes.md").await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn file_handler_missing_is_404() {
        let (_dir, state) = app_state(&[]);
        let resp = file_handler(&state, "/nope.md").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            resp.headers().get("X-Content-Type-Options").unwrap(),
            "nosniff"
        );
    }

    #[tokio::test]
    async fn file_handler_encoded_traversal_is_404() {
        let (_dir, state) = app_state(&[]);
        let resp = file_handler(&state, "/%2e%2e/etc/passwd").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn file_handler_bad_encoding_is_404() {
        let (_dir, state) = app_state(&[]);
        let resp = file_handler(&state, "/%zz.md").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
