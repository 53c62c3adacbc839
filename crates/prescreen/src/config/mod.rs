use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

const DEFAULT_OCR_LANGUAGES: &str = "eng+nor";
const DEFAULT_RENDER_DPI: f32 = 300.0;
const DEFAULT_UPLOAD_ROOT: &str = "data/uploads";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the pre-screening service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub ocr: OcrConfig,
    pub ner: NerConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let render_dpi = match env::var("OCR_RENDER_DPI") {
            Ok(raw) => raw
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|dpi| dpi.is_finite() && *dpi > 0.0)
                .ok_or(ConfigError::InvalidRenderDpi { value: raw })?,
            Err(_) => DEFAULT_RENDER_DPI,
        };

        let ocr = OcrConfig {
            tesseract_cmd: non_empty_var("OCR_TESSERACT_CMD").map(PathBuf::from),
            languages: non_empty_var("OCR_LANGUAGES")
                .unwrap_or_else(|| DEFAULT_OCR_LANGUAGES.to_string()),
            render_dpi,
        };

        let ner = NerConfig {
            gazetteer_path: non_empty_var("NER_GAZETTEER_PATH").map(PathBuf::from),
        };

        let storage = StorageConfig {
            upload_root: non_empty_var("STORAGE_UPLOAD_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_ROOT)),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            ocr,
            ner,
            storage,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// OCR engine and rasterization settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrConfig {
    pub tesseract_cmd: Option<PathBuf>,
    pub languages: String,
    pub render_dpi: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_cmd: None,
            languages: DEFAULT_OCR_LANGUAGES.to_string(),
            render_dpi: DEFAULT_RENDER_DPI,
        }
    }
}

impl OcrConfig {
    /// Resolve the tesseract binary: an existing configured path first, then common
    /// install locations for the current platform, then a bare `PATH` lookup.
    pub fn resolve_tesseract_cmd(&self) -> PathBuf {
        if let Some(configured) = self.tesseract_cmd.as_deref() {
            if configured.is_file() {
                return configured.to_path_buf();
            }
            tracing::debug!(
                path = %configured.display(),
                "configured tesseract binary not found, falling back to auto-detection"
            );
        }

        platform_tesseract_candidates()
            .into_iter()
            .find(|candidate| candidate.is_file())
            .unwrap_or_else(|| PathBuf::from("tesseract"))
    }
}

fn platform_tesseract_candidates() -> Vec<PathBuf> {
    if cfg!(target_os = "windows") {
        let mut candidates = vec![
            PathBuf::from(r"C:\Program Files\Tesseract-OCR\tesseract.exe"),
            PathBuf::from(r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe"),
        ];
        if let Ok(local) = env::var("LOCALAPPDATA") {
            candidates.push(
                Path::new(&local)
                    .join("Programs")
                    .join("Tesseract-OCR")
                    .join("tesseract.exe"),
            );
        }
        candidates
    } else if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/opt/homebrew/bin/tesseract"),
            PathBuf::from("/usr/local/bin/tesseract"),
        ]
    } else {
        vec![
            PathBuf::from("/usr/bin/tesseract"),
            PathBuf::from("/usr/local/bin/tesseract"),
        ]
    }
}

/// Optional named-entity model location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NerConfig {
    pub gazetteer_path: Option<PathBuf>,
}

/// Where uploaded document bytes live. Documents registered over HTTP must resolve below
/// `upload_root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub upload_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_root: PathBuf::from(DEFAULT_UPLOAD_ROOT),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidRenderDpi { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidRenderDpi { value } => {
                write!(f, "OCR_RENDER_DPI must be a positive number, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidRenderDpi { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
