#[macro_use]
extern crate log;

use std::path::Path;
use std::sync::Arc;

use dungeon_serve_lib::{
    find_free_port, spawn_open_browser, CorsServer, DirServer, ServeConfig, TcpStack,
};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn print_banner(port: u16, url: &str, root_dir: &Path) {
    println!("🏰{}🏰", "=".repeat(50));
    println!("🎮   DUNGEON MINI - local play server");
    println!("🏰{}🏰", "=".repeat(50));
    println!();
    println!("🚀 Server started on port {}", port);
    println!("🌐 URL: {}", url);
    println!("📁 Directory: {}", root_dir.display());
    println!();
    println!("📖 Server commands:");
    println!("   Ctrl+C - stop the server");
    println!();
}

async fn service_main(config: ServeConfig) -> Result<()> {
    // Port selection runs before anything binds.
    let port = find_free_port(config.port, config.scan_range).await;
    let url = config.url(port);

    let dir_server = DirServer::builder()
        .id("dungeon-mini")
        .root_dir(config.root_dir.clone())
        .index_file(config.index_file.clone())
        .build()
        .await?;
    let server = Arc::new(CorsServer::new(Arc::new(dir_server)));

    // The probe is only a heuristic, so the bind can still lose the race;
    // that failure is fatal and surfaced by the caller.
    let mut stack = TcpStack::builder()
        .bind(config.address(port))
        .server(server)
        .build()
        .await?;

    print_banner(port, &url, &config.root_dir);

    // Scheduled after the socket exists and before the accept loop runs, so
    // the first page load cannot race the bind.
    spawn_open_browser(url, config.browser_delay);

    stack.start()?;

    let _ = tokio::signal::ctrl_c().await;

    println!();
    println!("🛑 Stopping server...");
    stack.stop().await;
    println!("👋 Server stopped. Goodbye!");

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match ServeConfig::from_cwd() {
        Ok(config) => config,
        Err(e) => {
            error!("read working directory failed: {}", e);
            std::process::exit(1);
        }
    };

    info!("dungeon_serve start...");

    if let Err(e) = service_main(config).await {
        error!("server run error: {}", e);
        std::process::exit(1);
    }
}
