use std::sync::Arc;

use http::Request;
use http_body_util::combinators::BoxBody;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{serve_err, ServeError, ServeErrorCode, ServeResult};

/// Byte stream a connection rides on. Real connections are TCP sockets;
/// tests drive the server over in-memory duplex pipes.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

#[derive(Default, Debug, Clone)]
pub struct StreamInfo {
    pub src_addr: Option<String>,
}

impl StreamInfo {
    pub fn new(src_addr: String) -> Self {
        Self {
            src_addr: Some(src_addr),
        }
    }
}

/// A request handler. Concrete servers implement the single `serve_request`
/// capability; decorating behavior is layered by wrapping another
/// `Arc<dyn HttpServer>`.
#[async_trait::async_trait]
pub trait HttpServer: Send + Sync + 'static {
    async fn serve_request(
        &self,
        req: http::Request<BoxBody<Bytes, ServeError>>,
        info: StreamInfo,
    ) -> ServeResult<http::Response<BoxBody<Bytes, ServeError>>>;
    fn id(&self) -> String;
}

/// Drive one HTTP/1.x connection on `stream`, dispatching every request it
/// carries to `server`.
pub async fn hyper_serve_http1(
    stream: Box<dyn AsyncStream>,
    server: Arc<dyn HttpServer>,
    info: StreamInfo,
) -> ServeResult<()> {
    hyper::server::conn::http1::Builder::new()
        .serve_connection(
            TokioIo::new(stream),
            hyper::service::service_fn(|req: http::Request<hyper::body::Incoming>| {
                let server = server.clone();
                let info = info.clone();
                async move {
                    let (parts, body) = req.into_parts();
                    let body = body
                        .map_err(|e| serve_err!(ServeErrorCode::BadRequest, "{}", e))
                        .boxed();
                    let req = Request::from_parts(parts, body);
                    server.serve_request(req, info).await
                }
            }),
        )
        .await
        .map_err(|e| serve_err!(ServeErrorCode::StreamError, "{e}"))?;
    Ok(())
}
