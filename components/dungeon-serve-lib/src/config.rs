use std::path::PathBuf;
use std::time::Duration;

use crate::{into_serve_err, ServeErrorCode, ServeResult};

/// Port the scan starts at.
pub const DEFAULT_PORT: u16 = 8000;
/// How many candidate ports the scan covers.
pub const DEFAULT_SCAN_RANGE: u16 = 100;
/// Delay before the browser opens.
pub const DEFAULT_BROWSER_DELAY: Duration = Duration::from_secs(1);

/// Everything the process needs, passed explicitly into the port finder and
/// the server constructors instead of living in globals.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub port: u16,
    pub bind: String,
    pub scan_range: u16,
    pub root_dir: PathBuf,
    pub index_file: String,
    pub browser_delay: Duration,
}

impl ServeConfig {
    /// Config serving the process working directory.
    pub fn from_cwd() -> ServeResult<Self> {
        let root_dir = std::env::current_dir()
            .map_err(into_serve_err!(ServeErrorCode::IOError, "read working directory failed"))?;
        Ok(Self {
            root_dir,
            ..Self::default()
        })
    }

    /// Bind address for the chosen port.
    pub fn address(&self, port: u16) -> String {
        format!("{}:{}", self.bind, port)
    }

    /// URL the browser opens.
    pub fn url(&self, port: u16) -> String {
        format!("http://localhost:{}", port)
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: "0.0.0.0".to_string(),
            scan_range: DEFAULT_SCAN_RANGE,
            root_dir: PathBuf::from("."),
            index_file: "index.html".to_string(),
            browser_delay: DEFAULT_BROWSER_DELAY,
        }
    }
}
