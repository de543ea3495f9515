use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;

use crate::error::{DashboardError, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://vendas.db?mode=rwc";
pub const DEFAULT_SOURCE_PATH: &str = "VENDAS.xlsx";
pub const DEFAULT_CREDENTIALS_PATH: &str = "credenciais.json";
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_STORAGE_API_BASE: &str = "https://storage.googleapis.com";
pub const DEFAULT_PORT: u16 = 5001;
pub const DOTENV_FILE: &str = ".env";

/// Which backend the spreadsheet comes from, with its location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceConfig {
    LocalFile {
        path: PathBuf,
    },
    SheetsApi {
        spreadsheet_id: String,
        /// `None` reads the first worksheet.
        sheet: Option<String>,
        api_base: String,
    },
    ObjectStorage {
        bucket: String,
        object: String,
        api_base: String,
    },
}

/// How remote backends authenticate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialsConfig {
    pub key_file: PathBuf,
    pub static_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub source: SourceConfig,
    pub credentials: CredentialsConfig,
    pub write_back: bool,
    pub delete_by_product: bool,
    pub fetch_timeout: Duration,
    pub bind_addr: String,
    pub port: u16,
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            source: SourceConfig::LocalFile {
                path: PathBuf::from(DEFAULT_SOURCE_PATH),
            },
            credentials: CredentialsConfig {
                key_file: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
                static_token: None,
            },
            write_back: false,
            delete_by_product: false,
            fetch_timeout: Duration::from_secs(30),
            bind_addr: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl Config {
    /// Reads the process environment, falling back to `.env` in the working
    /// directory for keys the environment does not set.
    pub fn from_env() -> Result<Self> {
        Config::from_env_with_dotenv(Path::new(DOTENV_FILE))
    }

    /// Like [`Config::from_env`] with an explicit dotenv file.
    pub fn from_env_with_dotenv(path: &Path) -> Result<Self> {
        let file = read_dotenv(path)?;
        Config::from_lookup(|key| std::env::var(key).ok().or_else(|| file.get(key).cloned()))
    }

    /// Builds a config from any key lookup; unset or blank keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Config::default();

        let source = match get("SOURCE_BACKEND").as_deref().unwrap_or("local") {
            "local" | "file" => SourceConfig::LocalFile {
                path: get("SOURCE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_PATH)),
            },
            "sheets" => SourceConfig::SheetsApi {
                spreadsheet_id: get("SHEETS_SPREADSHEET_ID").ok_or_else(|| {
                    DashboardError::Config(
                        "SHEETS_SPREADSHEET_ID is required for the sheets backend".to_string(),
                    )
                })?,
                sheet: get("SHEETS_SHEET_NAME"),
                api_base: get("SHEETS_API_BASE")
                    .unwrap_or_else(|| DEFAULT_SHEETS_API_BASE.to_string()),
            },
            "storage" => {
                let (bucket, object) = match get("STORAGE_URI") {
                    Some(uri) => parse_gs_uri(&uri)?,
                    None => match (get("STORAGE_BUCKET"), get("STORAGE_OBJECT")) {
                        (Some(bucket), Some(object)) => (bucket, object),
                        _ => {
                            return Err(DashboardError::Config(
                                "the storage backend needs STORAGE_URI or STORAGE_BUCKET and STORAGE_OBJECT"
                                    .to_string(),
                            ));
                        }
                    },
                };
                SourceConfig::ObjectStorage {
                    bucket,
                    object,
                    api_base: get("STORAGE_API_BASE")
                        .unwrap_or_else(|| DEFAULT_STORAGE_API_BASE.to_string()),
                }
            }
            other => {
                return Err(DashboardError::Config(format!(
                    "unknown SOURCE_BACKEND {:?} (expected local, sheets or storage)",
                    other
                )));
            }
        };

        let fetch_timeout = match get("FETCH_TIMEOUT_SECS") {
            Some(v) => match v.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(DashboardError::Config(format!(
                        "FETCH_TIMEOUT_SECS must be a positive integer, got {:?}",
                        v
                    )));
                }
            },
            None => defaults.fetch_timeout,
        };

        let port = match get("PORT") {
            Some(v) => v
                .parse::<u16>()
                .map_err(|_| DashboardError::Config(format!("PORT must be a port number, got {:?}", v)))?,
            None => defaults.port,
        };

        Ok(Config {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            source,
            credentials: CredentialsConfig {
                key_file: get("GOOGLE_APPLICATION_CREDENTIALS")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.credentials.key_file),
                static_token: get("GOOGLE_ACCESS_TOKEN"),
            },
            write_back: parse_flag("WRITE_BACK", get("WRITE_BACK"))?,
            delete_by_product: parse_flag("DELETE_BY_PRODUCT", get("DELETE_BY_PRODUCT"))?,
            fetch_timeout,
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port,
            static_dir: get("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// Parses a dotenv file into key/value pairs. A missing file yields none.
pub fn read_dotenv(path: &Path) -> Result<HashMap<String, String>> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => return Ok(HashMap::new()),
        Err(e) => {
            return Err(DashboardError::Config(format!(
                "cannot read {}: {}",
                path.display(),
                e
            )));
        }
    };

    let values = iter
        .collect::<std::result::Result<HashMap<_, _>, _>>()
        .map_err(|e| DashboardError::Config(format!("invalid {}: {}", path.display(), e)))?;
    debug!("Loaded {} settings from {}", values.len(), path.display());
    Ok(values)
}

fn parse_flag(key: &str, value: Option<String>) -> Result<bool> {
    match value.map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on" | "sim") => Ok(true),
        Some("0" | "false" | "no" | "off" | "nao" | "não") => Ok(false),
        Some(other) => Err(DashboardError::Config(format!(
            "{} must be a boolean, got {:?}",
            key, other
        ))),
    }
}

/// Splits `gs://bucket/path/to/object` into bucket and object name.
pub fn parse_gs_uri(uri: &str) -> Result<(String, String)> {
    let rest = uri
        .strip_prefix("gs://")
        .ok_or_else(|| DashboardError::Config(format!("{:?} is not a gs:// URI", uri)))?;
    match rest.split_once('/') {
        Some((bucket, object)) if !bucket.is_empty() && !object.is_empty() => {
            Ok((bucket.to_string(), object.to_string()))
        }
        _ => Err(DashboardError::Config(format!(
            "{:?} must name both a bucket and an object",
            uri
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.listen_addr(), "127.0.0.1:5001");
    }

    #[test]
    fn sheets_backend_requires_spreadsheet_id() {
        let err = config(&[("SOURCE_BACKEND", "sheets")]).unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));

        let cfg = config(&[
            ("SOURCE_BACKEND", "sheets"),
            ("SHEETS_SPREADSHEET_ID", "abc123"),
        ])
        .unwrap();
        assert_eq!(
            cfg.source,
            SourceConfig::SheetsApi {
                spreadsheet_id: "abc123".into(),
                sheet: None,
                api_base: DEFAULT_SHEETS_API_BASE.into(),
            }
        );
    }

    #[test]
    fn storage_backend_accepts_gs_uri() {
        let cfg = config(&[
            ("SOURCE_BACKEND", "storage"),
            ("STORAGE_URI", "gs://meu-bucket/relatorios/VENDAS.xlsx"),
        ])
        .unwrap();
        assert_eq!(
            cfg.source,
            SourceConfig::ObjectStorage {
                bucket: "meu-bucket".into(),
                object: "relatorios/VENDAS.xlsx".into(),
                api_base: DEFAULT_STORAGE_API_BASE.into(),
            }
        );
        assert!(parse_gs_uri("gs://bucket-only").is_err());
        assert!(parse_gs_uri("s3://b/o").is_err());
    }

    #[test]
    fn flags_and_numbers_are_validated() {
        let cfg = config(&[
            ("WRITE_BACK", "true"),
            ("DELETE_BY_PRODUCT", "1"),
            ("FETCH_TIMEOUT_SECS", "5"),
            ("PORT", "8080"),
        ])
        .unwrap();
        assert!(cfg.write_back);
        assert!(cfg.delete_by_product);
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(5));
        assert_eq!(cfg.port, 8080);

        assert!(config(&[("WRITE_BACK", "talvez")]).is_err());
        assert!(config(&[("FETCH_TIMEOUT_SECS", "0")]).is_err());
        assert!(config(&[("PORT", "70000")]).is_err());
        assert!(config(&[("SOURCE_BACKEND", "ftp")]).is_err());
    }

    #[test]
    fn dotenv_file_supplies_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# credenciais\nSOURCE_BACKEND=sheets\nSHEETS_SPREADSHEET_ID=\"abc123\"\nWRITE_BACK=sim\n",
        )
        .unwrap();

        let values = read_dotenv(&path).unwrap();
        assert_eq!(values.get("SHEETS_SPREADSHEET_ID").map(String::as_str), Some("abc123"));

        let cfg = Config::from_lookup(|key| values.get(key).cloned()).unwrap();
        assert!(cfg.write_back);
        assert!(matches!(cfg.source, SourceConfig::SheetsApi { .. }));
    }

    #[test]
    fn missing_dotenv_is_empty_and_garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_dotenv(&dir.path().join(".env")).unwrap().is_empty());

        let path = dir.path().join("broken.env");
        std::fs::write(&path, "SOURCE BACKEND local\n").unwrap();
        assert!(matches!(read_dotenv(&path), Err(DashboardError::Config(_))));
    }
}
