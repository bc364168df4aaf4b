use std::path::{Component, Path, PathBuf};

use futures_util::TryStreamExt;
use http::StatusCode;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Bytes, Frame};
use tokio::io::AsyncReadExt;

use crate::{serve_err, HttpServer, ServeError, ServeErrorCode, ServeResult, StreamInfo};

/// DirServer builder for fluent configuration
pub struct DirServerBuilder {
    id: Option<String>,
    root_dir: Option<PathBuf>,
    index_file: Option<String>,
}

impl DirServerBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(root_dir.into());
        self
    }

    pub fn index_file(mut self, index_file: impl Into<String>) -> Self {
        self.index_file = Some(index_file.into());
        self
    }

    pub async fn build(self) -> ServeResult<DirServer> {
        DirServer::create_server(self).await
    }
}

/// DirServer - serves the files of a local directory over HTTP.
///
/// GET and HEAD only. A request for a directory resolves to its index file
/// when one exists, and to a generated listing page otherwise; requests
/// without the trailing slash are redirected first so relative links on the
/// listing resolve.
pub struct DirServer {
    id: String,
    root_dir: PathBuf,
    index_file: String,
}

impl DirServer {
    pub fn builder() -> DirServerBuilder {
        DirServerBuilder {
            id: None,
            root_dir: None,
            index_file: None,
        }
    }

    async fn create_server(builder: DirServerBuilder) -> ServeResult<DirServer> {
        if builder.id.is_none() {
            return Err(serve_err!(ServeErrorCode::InvalidConfig, "id is required"));
        }

        if builder.root_dir.is_none() {
            return Err(serve_err!(
                ServeErrorCode::InvalidConfig,
                "root_dir is required"
            ));
        }

        let root_dir = builder.root_dir.unwrap();
        if !root_dir.exists() {
            return Err(serve_err!(
                ServeErrorCode::InvalidConfig,
                "root_dir does not exist: {:?}",
                root_dir
            ));
        }

        if !root_dir.is_dir() {
            return Err(serve_err!(
                ServeErrorCode::InvalidConfig,
                "root_dir is not a directory: {:?}",
                root_dir
            ));
        }

        let index_file = builder.index_file.unwrap_or_else(|| "index.html".to_string());

        Ok(DirServer {
            id: builder.id.unwrap(),
            root_dir,
            index_file,
        })
    }

    /// Normalize the request path and resolve it inside the root directory.
    /// Returns None when the path would climb out of the root.
    fn resolve_path(&self, req_path: &str) -> Option<PathBuf> {
        let sub_path = req_path.trim_start_matches('/');

        let stays_inside = Path::new(sub_path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !stays_inside {
            return None;
        }

        Some(self.root_dir.join(sub_path))
    }

    /// Serve a file from the local directory, honoring a single-range
    /// `Range` header. Invalid ranges fall back to the full body.
    async fn serve_file(
        &self,
        file_path: &Path,
        req: &http::Request<BoxBody<Bytes, ServeError>>,
    ) -> ServeResult<http::Response<BoxBody<Bytes, ServeError>>> {
        let file = tokio::fs::File::open(&file_path).await.map_err(|e| {
            warn!("failed to open file: {:?}, error: {}", file_path, e);
            serve_err!(ServeErrorCode::IOError, "failed to open file: {}", e)
        })?;

        let file_meta = file.metadata().await.map_err(|e| {
            warn!("failed to read file metadata: {:?}, error: {}", file_path, e);
            serve_err!(ServeErrorCode::IOError, "failed to read file metadata: {}", e)
        })?;

        let file_size = file_meta.len();
        let mime_type = mime_guess::from_path(file_path).first_or_octet_stream();

        if let Some(range_header) = req.headers().get(hyper::header::RANGE) {
            if let Ok(range_str) = range_header.to_str() {
                if let Ok((start, end)) = parse_range(range_str, file_size) {
                    let mut file = tokio::io::BufReader::new(file);
                    use tokio::io::AsyncSeekExt;
                    file.seek(std::io::SeekFrom::Start(start))
                        .await
                        .map_err(|e| {
                            serve_err!(ServeErrorCode::IOError, "failed to seek file: {}", e)
                        })?;

                    let content_length = end - start + 1;
                    let limited_reader = file.take(content_length);
                    let stream = tokio_util::io::ReaderStream::new(limited_reader);
                    let stream_body = StreamBody::new(stream.map_ok(Frame::data));

                    return http::Response::builder()
                        .status(StatusCode::PARTIAL_CONTENT)
                        .header("Content-Type", mime_type.as_ref())
                        .header("Content-Length", content_length)
                        .header("Content-Range", format!("bytes {}-{}/{}", start, end, file_size))
                        .header("Accept-Ranges", "bytes")
                        .body(
                            BodyExt::map_err(stream_body, |e| {
                                ServeError::new(
                                    ServeErrorCode::StreamError,
                                    format!("stream error: {}", e),
                                )
                            })
                            .boxed(),
                        )
                        .map_err(|e| {
                            serve_err!(ServeErrorCode::IOError, "failed to build response: {}", e)
                        });
                }
            }
        }

        let stream = tokio_util::io::ReaderStream::new(file);
        let stream_body = StreamBody::new(stream.map_ok(Frame::data));

        http::Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", mime_type.as_ref())
            .header("Content-Length", file_size)
            .header("Accept-Ranges", "bytes")
            .body(
                BodyExt::map_err(stream_body, |e| {
                    ServeError::new(ServeErrorCode::StreamError, format!("stream error: {}", e))
                })
                .boxed(),
            )
            .map_err(|e| serve_err!(ServeErrorCode::IOError, "failed to build response: {}", e))
    }

    /// Render the listing page for a directory with no index file.
    async fn serve_listing(
        &self,
        dir_path: &Path,
        req_path: &str,
    ) -> ServeResult<http::Response<BoxBody<Bytes, ServeError>>> {
        let mut entries = tokio::fs::read_dir(dir_path).await.map_err(|e| {
            warn!("failed to read directory: {:?}, error: {}", dir_path, e);
            serve_err!(ServeErrorCode::IOError, "failed to read directory: {}", e)
        })?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            serve_err!(ServeErrorCode::IOError, "failed to read directory entry: {}", e)
        })? {
            let mut name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();

        let items: String = names
            .iter()
            .map(|name| format!("    <li><a href=\"{0}\">{0}</a></li>\n", html_escape(name)))
            .collect();

        let html = format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Directory listing for {title}</title>
</head>
<body>
  <h1>Directory listing for {title}</h1>
  <hr>
  <ul>
{items}  </ul>
  <hr>
</body>
</html>
"#,
            title = html_escape(req_path),
            items = items,
        );

        http::Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/html; charset=utf-8")
            .header("Content-Length", html.len())
            .body(Full::new(Bytes::from(html)).map_err(|e| match e {}).boxed())
            .map_err(|e| serve_err!(ServeErrorCode::IOError, "failed to build response: {}", e))
    }
}

#[async_trait::async_trait]
impl HttpServer for DirServer {
    async fn serve_request(
        &self,
        req: http::Request<BoxBody<Bytes, ServeError>>,
        _info: StreamInfo,
    ) -> ServeResult<http::Response<BoxBody<Bytes, ServeError>>> {
        let req_path = req.uri().path();
        let req_method = req.method();

        if req_method != hyper::Method::GET && req_method != hyper::Method::HEAD {
            warn!("method not allowed: {}", req_method);
            return Ok(text_response(
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed",
            ));
        }

        let file_path = match self.resolve_path(req_path) {
            Some(path) => path,
            None => {
                warn!("path traversal attempt: {}", req_path);
                return Ok(text_response(StatusCode::FORBIDDEN, "Forbidden"));
            }
        };

        if file_path.is_dir() {
            if !req_path.ends_with('/') {
                // Relative links on the listing only resolve below the
                // directory when the path carries the trailing slash.
                return Ok(redirect_response(&format!("{}/", req_path)));
            }

            let index_path = file_path.join(&self.index_file);
            if index_path.is_file() {
                return self.serve_file(&index_path, &req).await;
            }
            return self.serve_listing(&file_path, req_path).await;
        }

        if !file_path.is_file() {
            warn!("file not found: {:?}", file_path);
            return Ok(text_response(StatusCode::NOT_FOUND, "Not found"));
        }

        self.serve_file(&file_path, &req).await
    }

    fn id(&self) -> String {
        self.id.clone()
    }
}

fn text_response(
    status: StatusCode,
    body: &'static str,
) -> http::Response<BoxBody<Bytes, ServeError>> {
    http::Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Content-Length", body.len())
        .body(
            Full::new(Bytes::from_static(body.as_bytes()))
                .map_err(|e| match e {})
                .boxed(),
        )
        .unwrap()
}

fn redirect_response(location: &str) -> http::Response<BoxBody<Bytes, ServeError>> {
    http::Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header("Location", location)
        .header("Content-Length", 0)
        .body(Full::new(Bytes::new()).map_err(|e| match e {}).boxed())
        .unwrap()
}

/// Parse a single `bytes=start-end` range. Open ends fall back to the file
/// bounds.
fn parse_range(range: &str, file_size: u64) -> ServeResult<(u64, u64)> {
    let range = range.trim_start_matches("bytes=");
    let mut parts = range.split('-');

    let start = parts.next().and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);

    let end = parts
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or_else(|| file_size.saturating_sub(1));

    if start >= file_size || end >= file_size || start > end {
        return Err(serve_err!(ServeErrorCode::InvalidParam, "invalid range"));
    }

    Ok((start, end))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use http_body_util::Full;
    use hyper_util::rt::TokioIo;

    use crate::{hyper_serve_http1, StreamInfo};

    async fn test_server(root: &Path) -> Arc<DirServer> {
        Arc::new(
            DirServer::builder()
                .id("test")
                .root_dir(root.to_path_buf())
                .build()
                .await
                .unwrap(),
        )
    }

    /// One request/response exchange over an in-memory connection.
    async fn send_request(
        server: Arc<dyn HttpServer>,
        request: http::Request<Full<Bytes>>,
    ) -> http::Response<hyper::body::Incoming> {
        let (client, server_stream) = tokio::io::duplex(4096);

        tokio::spawn(async move {
            let _ = hyper_serve_http1(Box::new(server_stream), server, StreamInfo::default()).await;
        });

        let (mut sender, conn) = hyper::client::conn::http1::Builder::new()
            .handshake(TokioIo::new(client))
            .await
            .unwrap();

        tokio::spawn(async move {
            let _ = conn.await;
        });

        sender.send_request(request).await.unwrap()
    }

    fn get(path: &str) -> http::Request<Full<Bytes>> {
        http::Request::builder()
            .method("GET")
            .uri(format!("http://localhost{}", path))
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn empty_body() -> BoxBody<Bytes, ServeError> {
        Full::new(Bytes::new()).map_err(|e| match e {}).boxed()
    }

    #[tokio::test]
    async fn test_create_server_without_id() {
        let result = DirServer::builder().root_dir(PathBuf::from("/tmp")).build().await;
        assert!(result.is_err());
        if let Err(e) = result {
            assert_eq!(e.code(), ServeErrorCode::InvalidConfig);
        }
    }

    #[tokio::test]
    async fn test_create_server_without_root_dir() {
        let result = DirServer::builder().id("test").build().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_create_server_with_non_existent_dir() {
        let result = DirServer::builder()
            .id("test")
            .root_dir(PathBuf::from("/non/existent/dir"))
            .build()
            .await;
        assert!(result.is_err());
        if let Err(e) = result {
            assert_eq!(e.code(), ServeErrorCode::InvalidConfig);
        }
    }

    #[tokio::test]
    async fn test_create_server_with_file_as_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("not_a_dir");
        tokio::fs::write(&file_path, b"x").await.unwrap();

        let result = DirServer::builder().id("test").root_dir(file_path).build().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_serve_existing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        tokio::fs::write(temp_dir.path().join("test.txt"), b"Hello, World!")
            .await
            .unwrap();

        let server = test_server(temp_dir.path()).await;
        let resp = send_request(server, get("/test.txt")).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get("Content-Type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));

        let body = resp.collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"Hello, World!");
    }

    #[tokio::test]
    async fn test_head_request_has_no_body() {
        let temp_dir = tempfile::tempdir().unwrap();
        tokio::fs::write(temp_dir.path().join("test.txt"), b"Hello, World!")
            .await
            .unwrap();

        let server = test_server(temp_dir.path()).await;
        let request = http::Request::builder()
            .method("HEAD")
            .uri("http://localhost/test.txt")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let resp = send_request(server, request).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("Content-Length").unwrap(), "13");

        let body = resp.collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_serve_non_existent_file() {
        let temp_dir = tempfile::tempdir().unwrap();

        let server = test_server(temp_dir.path()).await;
        let resp = send_request(server, get("/non_existent.txt")).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_index_file_for_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        tokio::fs::write(temp_dir.path().join("index.html"), b"<h1>game</h1>")
            .await
            .unwrap();

        let server = test_server(temp_dir.path()).await;
        let resp = send_request(server, get("/")).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get("Content-Type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/html"));

        let body = resp.collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"<h1>game</h1>");
    }

    #[tokio::test]
    async fn test_directory_listing_without_index() {
        let temp_dir = tempfile::tempdir().unwrap();
        tokio::fs::write(temp_dir.path().join("game.js"), b"//").await.unwrap();
        tokio::fs::create_dir(temp_dir.path().join("assets")).await.unwrap();

        let server = test_server(temp_dir.path()).await;
        let resp = send_request(server, get("/")).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get("Content-Type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/html"));

        let body = resp.collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("game.js"));
        assert!(text.contains("assets/"));
    }

    #[tokio::test]
    async fn test_directory_redirects_without_trailing_slash() {
        let temp_dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(temp_dir.path().join("assets")).await.unwrap();

        let server = test_server(temp_dir.path()).await;
        let resp = send_request(server, get("/assets")).await;

        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers().get("Location").unwrap(), "/assets/");
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let temp_dir = tempfile::tempdir().unwrap();

        let server = test_server(temp_dir.path()).await;
        let request = http::Request::builder()
            .method("POST")
            .uri("http://localhost/test.txt")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let resp = send_request(server, request).await;

        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();

        let server = test_server(temp_dir.path()).await;
        let request = http::Request::builder()
            .method("GET")
            .uri("/../secret.txt")
            .body(empty_body())
            .unwrap();
        let resp = server
            .serve_request(request, StreamInfo::default())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_range_request() {
        let temp_dir = tempfile::tempdir().unwrap();
        tokio::fs::write(temp_dir.path().join("data.bin"), b"0123456789")
            .await
            .unwrap();

        let server = test_server(temp_dir.path()).await;
        let request = http::Request::builder()
            .method("GET")
            .uri("http://localhost/data.bin")
            .header("Range", "bytes=2-5")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let resp = send_request(server, request).await;

        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers().get("Content-Range").unwrap(), "bytes 2-5/10");

        let body = resp.collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"2345");
    }

    #[tokio::test]
    async fn test_invalid_range_falls_back_to_full_body() {
        let temp_dir = tempfile::tempdir().unwrap();
        tokio::fs::write(temp_dir.path().join("data.bin"), b"0123456789")
            .await
            .unwrap();

        let server = test_server(temp_dir.path()).await;
        let request = http::Request::builder()
            .method("GET")
            .uri("http://localhost/data.bin")
            .header("Range", "bytes=20-30")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let resp = send_request(server, request).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"0123456789");
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("bytes=0-4", 10).unwrap(), (0, 4));
        assert_eq!(parse_range("bytes=5-", 10).unwrap(), (5, 9));
        assert!(parse_range("bytes=4-2", 10).is_err());
        assert!(parse_range("bytes=0-4", 0).is_err());
    }
}
