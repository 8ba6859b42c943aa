//! Home directory and socket path resolution.
//!
//! The home directory comes from `UWHOISD_HOME`, or from a `.env` file at the
//! crate root when the variable is not set. It is resolved once into an
//! [`Environment`] that callers pass around explicitly.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use clap::Args;

use crate::errors::{HelperError, Result};

pub const HOME_VAR: &str = "UWHOISD_HOME";
pub const VIRTUAL_ENV_VAR: &str = "VIRTUAL_ENV";

#[derive(Args, Debug, Clone)]
pub struct EnvConfig {
    #[arg(
        long,
        help = "Home directory of the uwhoisd services (skips UWHOISD_HOME and .env lookup)"
    )]
    pub home: Option<PathBuf>,

    #[arg(long, help = "Location of the .env file read when UWHOISD_HOME is unset")]
    pub dotenv: Option<PathBuf>,

    #[arg(
        long,
        env = "UWHOISD_SHUTDOWN_CHECK_SECS",
        help = "How often long sleeps check the shutdown flag",
        default_value = "10"
    )]
    pub shutdown_check_secs: u64,
}

impl EnvConfig {
    pub fn environment(&self) -> Result<Environment> {
        if let Some(home) = &self.home {
            return Ok(Environment::from_home(home));
        }
        let dotenv = self.dotenv.clone().unwrap_or_else(default_dotenv_path);
        Environment::resolve_with(HOME_VAR, &dotenv)
    }

    pub fn shutdown_check(&self) -> Duration {
        Duration::from_secs(self.shutdown_check_secs)
    }
}

/// A sub-service listening on a well-known socket under the home directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Cache,
    Whowas,
}

impl Service {
    pub const ALL: [Service; 2] = [Service::Cache, Service::Whowas];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Cache => "cache",
            Service::Whowas => "whowas",
        }
    }

    fn relative_socket(&self) -> PathBuf {
        match self {
            Service::Cache => Path::new("cache").join("cache.sock"),
            Service::Whowas => Path::new("whowas").join("whowas.sock"),
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = HelperError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "cache" => Ok(Service::Cache),
            "whowas" => Ok(Service::Whowas),
            other => Err(HelperError::UnknownService(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    home: PathBuf,
}

impl Environment {
    pub fn from_home(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Resolves the home from `UWHOISD_HOME`, falling back to the crate's `.env`.
    pub fn resolve() -> Result<Self> {
        Self::resolve_with(HOME_VAR, &default_dotenv_path())
    }

    /// Resolves the home from `variable`. When it is unset and `dotenv` exists,
    /// every pair in the file is exported into the process environment first.
    pub fn resolve_with(variable: &str, dotenv: &Path) -> Result<Self> {
        if var_is_set(variable).is_none() && dotenv.exists() {
            log::debug!("{} unset, loading {}", variable, dotenv.display());
            load_dotenv(dotenv)?;
        }

        match var_is_set(variable) {
            Some(home) => {
                log::debug!("Resolved home directory {}", home);
                Ok(Self::from_home(home))
            }
            None => {
                let guessed_home = dotenv.parent().unwrap_or(dotenv);
                Err(HelperError::MissingEnv {
                    variable: variable.to_string(),
                    message: format!(
                        "Run the following command (assuming you run the code from the cloned repository): export {}='{}'",
                        variable,
                        guessed_home.display()
                    ),
                })
            }
        }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn socket_path(&self, service: Service) -> PathBuf {
        self.home.join(service.relative_socket())
    }

    /// Socket path of the service called `name`, as a string. Fails rather
    /// than rewriting a home that is not valid UTF-8.
    pub fn get_socket_path(&self, name: &str) -> Result<String> {
        let path = self.socket_path(name.parse()?);
        match path.to_str() {
            Some(path) => Ok(path.to_string()),
            None => Err(HelperError::NonUtf8Path(path)),
        }
    }
}

pub fn default_dotenv_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(".env")
}

fn var_is_set(variable: &str) -> Option<String> {
    std::env::var(variable).ok().filter(|v| !v.is_empty())
}

pub fn get_storage_path() -> Result<PathBuf> {
    match var_is_set(VIRTUAL_ENV_VAR) {
        Some(path) => Ok(PathBuf::from(path)),
        None => Err(HelperError::MissingEnv {
            variable: VIRTUAL_ENV_VAR.to_string(),
            message: "This project really wants to run from a virtual environment.".to_string(),
        }),
    }
}

/// Reads `KEY=VALUE` lines from `path` and sets each pair in the process
/// environment. Every line must contain a `=`; blank lines and comments are
/// rejected like any other malformed line.
pub fn load_dotenv(path: &Path) -> Result<Vec<(String, String)>> {
    let content = std::fs::read_to_string(path).map_err(|e| HelperError::io(path, e))?;

    let mut pairs = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        let Some((key, value)) = line.split_once('=') else {
            return Err(HelperError::MalformedDotenv {
                path: path.to_path_buf(),
                line: idx + 1,
                content: raw.to_string(),
            });
        };
        let value = strip_quotes(value);
        if key.is_empty() || key.contains('\0') || value.contains('\0') {
            return Err(HelperError::MalformedDotenv {
                path: path.to_path_buf(),
                line: idx + 1,
                content: raw.to_string(),
            });
        }
        std::env::set_var(key, value);
        pairs.push((key.to_string(), value.to_string()));
    }
    Ok(pairs)
}

fn strip_quotes(value: &str) -> &str {
    if value.starts_with('"') || value.starts_with('\'') {
        let mut chars = value.chars();
        chars.next();
        chars.next_back();
        chars.as_str()
    } else {
        value
    }
}

pub fn safe_create_dir(to_create: &Path) -> Result<()> {
    if to_create.exists() && !to_create.is_dir() {
        return Err(HelperError::CreateDirectory(to_create.to_path_buf()));
    }
    std::fs::create_dir_all(to_create).map_err(|e| HelperError::io(to_create, e))
}
