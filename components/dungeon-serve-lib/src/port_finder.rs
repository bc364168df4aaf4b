use tokio::net::TcpStream;

/// True when something on localhost already accepts connections on `port`.
///
/// Connect-style probe: a refused connection means nothing is listening. The
/// probe and a later bind are not atomic, so a port reported free can still
/// be grabbed in between.
pub async fn port_in_use(port: u16) -> bool {
    TcpStream::connect(("127.0.0.1", port)).await.is_ok()
}

/// Scan `start .. start + scan_range` and return the first port the probe
/// reports free. When the whole range is occupied the start port is returned
/// unchanged and the caller surfaces the bind error.
pub async fn find_free_port(start: u16, scan_range: u16) -> u16 {
    let end = start.saturating_add(scan_range);
    for port in start..end {
        if !port_in_use(port).await {
            return port;
        }
    }
    debug!("no free port in {}..{}, falling back to {}", start, end, start);
    start
}
