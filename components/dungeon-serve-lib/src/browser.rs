use std::time::Duration;

/// Open the OS default browser at `url` after `delay`, once, on a detached
/// background task. Fire and forget: launch failures are not surfaced and
/// the task is never joined, so it cannot keep the process alive.
pub fn spawn_open_browser(url: String, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(e) = open::that(url.as_str()) {
            debug!("browser launch failed: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_returns_immediately() {
        let started = std::time::Instant::now();
        // A delay far longer than the test; the launch never fires because
        // the runtime shuts down first.
        spawn_open_browser("http://localhost:1".to_string(), Duration::from_secs(60));
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
