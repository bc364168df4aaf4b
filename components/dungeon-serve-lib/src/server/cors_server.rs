use std::sync::Arc;

use http::{HeaderValue, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;

use crate::{HttpServer, ServeError, ServeResult, StreamInfo};

/// Decoration applied to every response the wrapped server produces, success
/// or error: the three permissive CORS headers, plus the stdout access-log
/// line with its 🌐 marker.
pub struct CorsServer {
    inner: Arc<dyn HttpServer>,
}

impl CorsServer {
    pub fn new(inner: Arc<dyn HttpServer>) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl HttpServer for CorsServer {
    async fn serve_request(
        &self,
        req: http::Request<BoxBody<Bytes, ServeError>>,
        info: StreamInfo,
    ) -> ServeResult<http::Response<BoxBody<Bytes, ServeError>>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let version = req.version();

        let mut response = match self.inner.serve_request(req, info.clone()).await {
            Ok(response) => response,
            Err(e) => {
                warn!("server {} failed: {}", self.inner.id(), e);
                internal_error_response()
            }
        };

        let headers = response.headers_mut();
        headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
        headers.insert(
            "Access-Control-Allow-Methods",
            HeaderValue::from_static("GET, POST, OPTIONS"),
        );
        headers.insert(
            "Access-Control-Allow-Headers",
            HeaderValue::from_static("Content-Type"),
        );

        let client = info.src_addr.as_deref().unwrap_or("-");
        println!(
            "🌐 {} - \"{} {} {:?}\" {}",
            client,
            method,
            path,
            version,
            response.status().as_u16()
        );

        Ok(response)
    }

    fn id(&self) -> String {
        self.inner.id()
    }
}

fn internal_error_response() -> http::Response<BoxBody<Bytes, ServeError>> {
    let body = "Internal server error";
    http::Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Content-Length", body.len())
        .body(
            Full::new(Bytes::from_static(body.as_bytes()))
                .map_err(|e| match e {})
                .boxed(),
        )
        .unwrap()
}
