use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HelperError>;

#[derive(Debug, Error)]
pub enum HelperError {
    /// A required environment variable is not set.
    #[error("{variable} is missing. {message}")]
    MissingEnv { variable: String, message: String },

    #[error("malformed line {line} in {}: {content:?} (expected KEY=VALUE)", path.display())]
    MalformedDotenv {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("the path {} already exists and is not a directory", .0.display())]
    CreateDirectory(PathBuf),

    /// Only the `cache` and `whowas` services have a socket.
    #[error("unknown service {0:?}")]
    UnknownService(String),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("the path {} is not valid UTF-8", .0.display())]
    NonUtf8Path(PathBuf),
}

impl HelperError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HelperError::Io {
            path: path.into(),
            source,
        }
    }
}
