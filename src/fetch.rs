//! Document sources: where the viewer fetches markdown text from.
//!
//! [`DirSource`] reads files below a local directory, applying the same
//! containment rules as the HTTP server. [`HttpSource`] issues GET requests
//! relative to a base URL. Both report failures as a [`LoadError`], which the
//! controller turns into the error panel.

use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use reqwest::{Client, Url};

/// Maximum file size that will be read (16 MiB).
pub const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Why a document could not be loaded.
///
/// Both variants are shown to the user the same way; the split only shapes the
/// message and the status code the server answers with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The source answered with a non-success status.
    Status {
        file: String,
        code: u16,
        reason: String,
    },
    /// The request itself failed (connection, I/O, decoding).
    Transport { file: String, message: String },
}

impl LoadError {
    fn status(file: &str, code: u16, reason: &str) -> Self {
        LoadError::Status {
            file: file.to_owned(),
            code,
            reason: reason.to_owned(),
        }
    }

    fn transport(file: &str, message: impl fmt::Display) -> Self {
        LoadError::Transport {
            file: file.to_owned(),
            message: message.to_string(),
        }
    }

    fn not_found(file: &str) -> Self {
        Self::status(file, 404, "Not Found")
    }

    /// HTTP status equivalent, used when the server relays the failure.
    pub fn http_status(&self) -> u16 {
        match self {
            LoadError::Status { code, .. } => *code,
            LoadError::Transport { .. } => 500,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Status { file, reason, .. } => write!(f, "Failed to load {file}: {reason}"),
            LoadError::Transport { file, message } => {
                write!(f, "Failed to load {file}: {message}")
            }
        }
    }
}

impl std::error::Error for LoadError {}

/// Something that can produce the markdown text for a registry filename.
pub trait DocumentSource {
    fn fetch(&self, file: &str) -> impl Future<Output = Result<String, LoadError>> + Send;
}

impl<S: DocumentSource + Sync> DocumentSource for &S {
    fn fetch(&self, file: &str) -> impl Future<Output = Result<String, LoadError>> + Send {
        (**self).fetch(file)
    }
}

// ---------------------------------------------------------------------------
// Directory source
// ---------------------------------------------------------------------------

/// Normalize a relative path, stripping `.` and `..` components.
///
/// Splits on `/`, ignores empty components and `.`, resolves `..` by popping
/// the stack.  Returns `None` if a `..` would escape the root (stack underflow),
/// which signals a path-traversal attempt.
pub fn normalize_path(decoded: &str) -> Option<PathBuf> {
    let mut parts: Vec<&str> = Vec::new();
    for component in decoded.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                // Attempted traversal above root → reject.
                parts.pop()?;
            }
            name => parts.push(name),
        }
    }
    let mut path = PathBuf::new();
    for part in &parts {
        path.push(part);
    }
    Some(path)
}

/// A file resolved inside a [`DirSource`] root, ready to be read.
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<std::time::SystemTime>,
}

/// Reads documents from a directory tree.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
    /// Canonicalized `root` used for symlink-safe containment checks.
    canonical_root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        let canonical_root = std::fs::canonicalize(&root)?;
        if !canonical_root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(Self {
            root,
            canonical_root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `file` to an existing regular file below the root.
    ///
    /// Steps:
    /// 1. Normalise: strip `.`/`..`; traversal above root → 404.
    /// 2. Stat the candidate; missing or not a regular file → 404.
    /// 3. Canonicalise and re-verify containment (symlinks) → 404 on escape.
    /// 4. Size guard: larger than [`MAX_FILE_SIZE`] → 413.
    pub async fn resolve(&self, file: &str) -> Result<ResolvedFile, LoadError> {
        if file.contains('\0') {
            eprintln!("[resolve] file={file:?} branch=denied reason=null-byte");
            return Err(LoadError::not_found(file));
        }

        let Some(normalized) = normalize_path(file) else {
            eprintln!("[resolve] file={file} branch=denied reason=path-traversal");
            return Err(LoadError::not_found(file));
        };
        if normalized.as_os_str().is_empty() {
            return Err(LoadError::not_found(file));
        }

        let candidate = self.root.join(&normalized);
        match tokio::fs::metadata(&candidate).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                eprintln!("[resolve] file={file} branch=denied reason=not-found");
                return Err(LoadError::not_found(file));
            }
        }

        let canonical = match tokio::fs::canonicalize(&candidate).await {
            Ok(c) => c,
            Err(_) => {
                eprintln!("[resolve] file={file} branch=denied reason=canonicalize-failed");
                return Err(LoadError::not_found(file));
            }
        };
        if !canonical.starts_with(&self.canonical_root) {
            eprintln!(
                "[resolve] file={file} branch=denied reason=outside-root canonical={}",
                canonical.display()
            );
            return Err(LoadError::not_found(file));
        }

        let meta = tokio::fs::metadata(&canonical)
            .await
            .map_err(|e| LoadError::transport(file, e))?;
        let size = meta.len();
        if size > MAX_FILE_SIZE {
            eprintln!("[resolve] file={file} branch=denied reason=too-large size={size}");
            return Err(LoadError::status(file, 413, "Content Too Large"));
        }

        Ok(ResolvedFile {
            path: canonical,
            size,
            modified: meta.modified().ok(),
        })
    }

    /// Resolve and read `file` as raw bytes.
    pub async fn read_bytes(&self, file: &str) -> Result<(ResolvedFile, Vec<u8>), LoadError> {
        let resolved = self.resolve(file).await?;
        let bytes = tokio::fs::read(&resolved.path)
            .await
            .map_err(|e| LoadError::transport(file, e))?;
        Ok((resolved, bytes))
    }
}

impl DocumentSource for DirSource {
    async fn fetch(&self, file: &str) -> Result<String, LoadError> {
        let (resolved, bytes) = self.read_bytes(file).await?;
        eprintln!("[fetch] source=dir file={file} size={}", resolved.size);
        String::from_utf8(bytes).map_err(|_| LoadError::transport(file, "document is not valid UTF-8"))
    }
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

/// Fetches documents with GET requests relative to a base URL.
#[derive(Debug, Clone)]
pub struct HttpSource {
    base: Url,
    client: Client,
}

impl HttpSource {
    /// `base` is treated as a directory: a missing trailing `/` is added so
    /// that `http://host/docs` resolves `DMS.md` to `http://host/docs/DMS.md`.
    pub fn new(base: &str) -> Result<Self, String> {
        let with_slash = if base.ends_with('/') {
            base.to_owned()
        } else {
            format!("{base}/")
        };
        let base = Url::parse(&with_slash).map_err(|e| format!("invalid source URL '{base}': {e}"))?;
        Ok(Self {
            base,
            client: Client::new(),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn url_for(&self, file: &str) -> Result<Url, LoadError> {
        self.base
            .join(file)
            .map_err(|e| LoadError::transport(file, format!("invalid document URL: {e}")))
    }
}

impl DocumentSource for HttpSource {
    async fn fetch(&self, file: &str) -> Result<String, LoadError> {
        let url = self.url_for(file)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| LoadError::transport(file, e))?;

        let status = response.status();
        eprintln!("[fetch] source=http url={url} status={}", status.as_u16());
        if !status.is_success() {
            return Err(LoadError::status(
                file,
                status.as_u16(),
                status.canonical_reason().unwrap_or(""),
            ));
        }

        response.text().await.map_err(|e| LoadError::transport(file, e))
    }
}

// ---------------------------------------------------------------------------
// Source selection
// ---------------------------------------------------------------------------

/// Either kind of source, chosen from a `--source` argument.
#[derive(Debug, Clone)]
pub enum Source {
    Dir(DirSource),
    Http(HttpSource),
}

impl Source {
    /// `http://` and `https://` arguments select [`HttpSource`]; anything else
    /// is a directory path.
    pub fn from_arg(arg: &str) -> Result<Self, String> {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            HttpSource::new(arg).map(Source::Http)
        } else {
            DirSource::new(arg)
                .map(Source::Dir)
                .map_err(|e| format!("cannot use '{arg}' as a document directory: {e}"))
        }
    }

    /// Where documents come from, for log lines.
    pub fn describe(&self) -> String {
        match self {
            Source::Dir(dir) => format!("dir:{}", dir.root().display()),
            Source::Http(http) => format!("http:{}", http.base()),
        }
    }
}

impl DocumentSource for Source {
    async fn fetch(&self, file: &str) -> Result<String, LoadError> {
        match self {
            Source::Dir(dir) => dir.fetch(file).await,
            Source::Http(http) => http.fetch(file).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    // --- normalize_path ---

    #[test]
    fn normalize_simple_path() {
        assert_eq!(normalize_path("docs/guide.md").unwrap(), PathBuf::from("docs/guide.md"));
    }

    #[test]
    fn normalize_dot_components_stripped() {
        assert_eq!(normalize_path("./a/./b.md").unwrap(), PathBuf::from("a/b.md"));
    }

    #[test]
    fn normalize_dotdot_within_root() {
        assert_eq!(normalize_path("a/b/../c.md").unwrap(), PathBuf::from("a/c.md"));
    }

    #[test]
    fn normalize_traversal_above_root_rejected() {
        assert!(normalize_path("../etc/passwd").is_none());
        assert!(normalize_path("a/../../etc/passwd").is_none());
    }

    // --- LoadError ---

    #[test]
    fn status_error_message_uses_reason() {
        let err = LoadError::status("DMS.md", 404, "Not Found");
        assert_eq!(err.to_string(), "Failed to load DMS.md: Not Found");
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn transport_error_maps_to_500() {
        let err = LoadError::transport("DMS.md", "connection refused");
        assert_eq!(err.to_string(), "Failed to load DMS.md: connection refused");
        assert_eq!(err.http_status(), 500);
    }

    // --- DirSource ---

    #[tokio::test]
    async fn dir_source_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("DMS.md"), "# DMS\n").unwrap();
        let source = DirSource::new(dir.path()).unwrap();
        assert_eq!(source.fetch("DMS.md").await.unwrap(), "# DMS\n");
    }

    #[tokio::test]
    async fn dir_source_reads_nested_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("notes")).unwrap();
        std::fs::write(dir.path().join("notes/a.md"), "a").unwrap();
        let source = DirSource::new(dir.path()).unwrap();
        assert_eq!(source.fetch("notes/a.md").await.unwrap(), "a");
    }

    #[tokio::test]
    async fn dir_source_missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirSource::new(dir.path()).unwrap();
        let err = source.fetch("missing.md").await.unwrap_err();
        assert_eq!(err, LoadError::not_found("missing.md"));
    }

    #[tokio::test]
    async fn dir_source_directory_is_404() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        let source = DirSource::new(dir.path()).unwrap();
        assert_eq!(source.fetch("sub").await.unwrap_err().http_status(), 404);
        assert_eq!(source.fetch("").await.unwrap_err().http_status(), 404);
    }

    #[tokio::test]
    async fn dir_source_traversal_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("inner");
        std::fs::create_dir_all(&inner).unwrap();
        std::fs::write(dir.path().join("secret.md"), "secret").unwrap();
        let source = DirSource::new(&inner).unwrap();
        assert_eq!(source.fetch("../secret.md").await.unwrap_err().http_status(), 404);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dir_source_symlink_escape_is_404() {
        use std::os::unix::fs::symlink;

        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.md"), "secret").unwrap();
        let root = tempfile::tempdir().unwrap();
        symlink(outside.path().join("secret.md"), root.path().join("evil.md")).unwrap();

        let source = DirSource::new(root.path()).unwrap();
        assert_eq!(source.fetch("evil.md").await.unwrap_err().http_status(), 404);
    }

    #[tokio::test]
    async fn dir_source_oversized_file_is_413() {
        let dir = tempfile::tempdir().unwrap();
        let file = std::fs::File::create(dir.path().join("big.md")).unwrap();
        file.set_len(MAX_FILE_SIZE + 1).unwrap();
        let source = DirSource::new(dir.path()).unwrap();
        let err = source.fetch("big.md").await.unwrap_err();
        assert_eq!(err.http_status(), 413);
        assert_eq!(err.to_string(), "Failed to load big.md: Content Too Large");
    }

    #[tokio::test]
    async fn dir_source_invalid_utf8_is_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bin.md"), [0xff, 0xfe, 0x00]).unwrap();
        let source = DirSource::new(dir.path()).unwrap();
        assert!(matches!(
            source.fetch("bin.md").await,
            Err(LoadError::Transport { .. })
        ));
    }

    #[test]
    fn dir_source_rejects_missing_root() {
        assert!(DirSource::new("/definitely/not/a/real/dir").is_err());
    }

    // --- HttpSource ---

    #[test]
    fn http_source_adds_trailing_slash() {
        let source = HttpSource::new("http://localhost:9/docs").unwrap();
        assert_eq!(
            source.url_for("DMS.md").unwrap().as_str(),
            "http://localhost:9/docs/DMS.md"
        );
    }

    #[tokio::test]
    async fn http_source_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/DMS.md"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# DMS\n"))
            .mount(&server)
            .await;

        let source = HttpSource::new(&server.uri()).unwrap();
        assert_eq!(source.fetch("DMS.md").await.unwrap(), "# DMS\n");
    }

    #[tokio::test]
    async fn http_source_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Velocity.md"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = HttpSource::new(&server.uri()).unwrap();
        let err = source.fetch("Velocity.md").await.unwrap_err();
        assert_eq!(
            err,
            LoadError::status("Velocity.md", 500, "Internal Server Error")
        );
        assert_eq!(
            err.to_string(),
            "Failed to load Velocity.md: Internal Server Error"
        );
    }

    #[tokio::test]
    async fn http_source_unmatched_path_is_404() {
        let server = MockServer::start().await;
        let source = HttpSource::new(&server.uri()).unwrap();
        let err = source.fetch("nope.md").await.unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[tokio::test]
    async fn http_source_connection_failure_is_transport_error() {
        // Bind then drop a listener so the port is very likely closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let source = HttpSource::new(&format!("http://127.0.0.1:{port}/")).unwrap();
        assert!(matches!(
            source.fetch("DMS.md").await,
            Err(LoadError::Transport { .. })
        ));
    }

    #[test]
    fn source_from_arg_picks_http_for_urls() {
        assert!(matches!(
            Source::from_arg("https://example.com/docs"),
            Ok(Source::Http(_))
        ));
    }

    #[test]
    fn source_from_arg_picks_dir_for_paths() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Source::from_arg(dir.path().to_str().unwrap()),
            Ok(Source::Dir(_))
        ));
    }

    #[test]
    fn describe_names_base_url() {
        let source = Source::from_arg("http://localhost:9/docs").unwrap();
        assert_eq!(source.describe(), "http:http://localhost:9/docs/");
    }

    #[test]
    fn describe_names_directory_root() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::from_arg(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(source.describe(), format!("dir:{}", dir.path().display()));
    }
}
