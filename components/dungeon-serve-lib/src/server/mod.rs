mod cors_server;
mod dir_server;
mod server;

pub use cors_server::*;
pub use dir_server::*;
pub use server::*;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ServeErrorCode {
    BindFailed,
    InvalidConfig,
    InvalidParam,
    IOError,
    BadRequest,
    StreamError,
}

/// Code-carrying error for every fallible operation in this crate.
#[derive(Debug, thiserror::Error)]
#[error("{msg} ({code:?})")]
pub struct ServeError {
    code: ServeErrorCode,
    msg: String,
}

impl ServeError {
    pub fn new(code: ServeErrorCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
        }
    }

    pub fn code(&self) -> ServeErrorCode {
        self.code
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }
}

pub type ServeResult<T> = std::result::Result<T, ServeError>;

#[macro_export]
macro_rules! serve_err {
    ($code:expr, $($arg:tt)*) => {
        $crate::ServeError::new($code, format!($($arg)*))
    };
}

/// Closure form for `map_err`: wraps the source error under `$code`.
#[macro_export]
macro_rules! into_serve_err {
    ($code:expr) => {
        |e| $crate::ServeError::new($code, e.to_string())
    };
    ($code:expr, $($arg:tt)*) => {
        |e| $crate::ServeError::new($code, format!("{}: {}", format!($($arg)*), e))
    };
}
