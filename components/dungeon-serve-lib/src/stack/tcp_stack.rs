use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::{
    hyper_serve_http1, into_serve_err, serve_err, HttpServer, ServeErrorCode, ServeResult,
    StreamInfo,
};

pub struct TcpStackBuilder {
    bind: Option<String>,
    server: Option<Arc<dyn HttpServer>>,
}

impl TcpStackBuilder {
    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = Some(bind.into());
        self
    }

    pub fn server(mut self, server: Arc<dyn HttpServer>) -> Self {
        self.server = Some(server);
        self
    }

    pub async fn build(self) -> ServeResult<TcpStack> {
        TcpStack::create(self).await
    }
}

/// Exclusive owner of the listening socket. `build` binds, `start` runs the
/// accept loop on a background task, and `stop` makes the loop exit and
/// waits until the socket is released.
pub struct TcpStack {
    listener: Option<TcpListener>,
    server: Arc<dyn HttpServer>,
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for TcpStack {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl TcpStack {
    pub fn builder() -> TcpStackBuilder {
        TcpStackBuilder {
            bind: None,
            server: None,
        }
    }

    async fn create(config: TcpStackBuilder) -> ServeResult<Self> {
        if config.bind.is_none() {
            return Err(serve_err!(ServeErrorCode::InvalidConfig, "bind is required"));
        }
        if config.server.is_none() {
            return Err(serve_err!(
                ServeErrorCode::InvalidConfig,
                "server is required"
            ));
        }

        let bind_addr = config.bind.unwrap();
        let listener = TcpListener::bind(bind_addr.as_str())
            .await
            .map_err(into_serve_err!(ServeErrorCode::BindFailed, "bind {bind_addr}"))?;

        Ok(Self {
            listener: Some(listener),
            server: config.server.unwrap(),
            shutdown: Arc::new(Notify::new()),
            handle: None,
        })
    }

    /// Address the socket actually bound to.
    pub fn local_addr(&self) -> ServeResult<SocketAddr> {
        match &self.listener {
            Some(listener) => listener
                .local_addr()
                .map_err(into_serve_err!(ServeErrorCode::IOError, "read local addr failed")),
            None => Err(serve_err!(
                ServeErrorCode::InvalidConfig,
                "stack already started"
            )),
        }
    }

    pub fn start(&mut self) -> ServeResult<()> {
        let listener = self.listener.take().ok_or_else(|| {
            serve_err!(ServeErrorCode::InvalidConfig, "stack already started")
        })?;
        let server = self.server.clone();
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    accepted = listener.accept() => {
                        let (stream, _) = match accepted {
                            Ok(s) => s,
                            Err(e) => {
                                log::error!("accept tcp stream failed: {}", e);
                                continue;
                            }
                        };

                        let info = stream
                            .peer_addr()
                            .map(|addr| StreamInfo::new(addr.to_string()))
                            .unwrap_or_default();
                        let server = server.clone();
                        tokio::spawn(async move {
                            if let Err(e) = hyper_serve_http1(Box::new(stream), server, info).await {
                                log::error!("handle tcp stream failed: {}", e);
                            }
                        });
                    }
                }
            }
            // Loop exit drops the listener, releasing the port.
        });
        self.handle = Some(handle);
        Ok(())
    }

    /// Signal the accept loop to exit and wait for the socket release.
    pub async fn stop(&mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}
