use url::Url;
use std::{path::PathBuf, time};
use crate::IngestError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 16;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const FS_TIMEOUT: u64 = 5000;
pub const MAX_INFLIGHT: usize = 4;

/// Wrapper over env::var to return an invalid enviroment var error
fn env_check(s: &str) -> Result<String, IngestError> {
    match std::env::var(s) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(IngestError::Config(format!("{s} was not set"))),
    }
}

/// Optional variable, blank counts as unset
fn env_opt(s: &str) -> Option<String> {
    std::env::var(s).ok().filter(|v| !v.trim().is_empty())
}

fn env_to_uint(s: &str, default: u64) -> Result<u64, IngestError> {
    match env_opt(s) {
        Some(v) => v.trim().parse::<u64>()
            .map_err(|e| IngestError::Config(format!("{s} invalid: {e}"))),
        None => Ok(default)
    }
}

/// Ensures that url is http or https, the media service commonly runs
/// on a plain http port next to the operator
fn ensure_http(url: &Url) -> Result<(), String> {
    match url.scheme() {
        "https" | "http" => Ok(()),
        other => Err(format!("URL must be http(s), got {other}: {url}"))
    }
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

fn parse_url(var: &str, raw: &str) -> Result<Url, IngestError> {
    let url = Url::parse(raw)
        .map_err(|e| IngestError::Config(format!("{var} invalid {e}")))?;
    ensure_http(&url).map_err(IngestError::Config)?;
    Ok(url)
}

/// Identity sent to every upstream, discogs rejects requests without one
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub user_agent: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("release-fetcher/{}", env!("CARGO_PKG_VERSION"))
        }
    }
}

fn build_identity() -> IdentityConfig {
    match env_opt("USER_AGENT") {
        Some(user_agent) => IdentityConfig { user_agent },
        None => IdentityConfig::default()
    }
}

///
/// Configuration for the discogs catalog
///
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub base_url: Url,          // https://api.discogs.com/
    pub token: Option<String>,  // search token, the shell prompts if absent
    pub per_page: u32,          // default 100
    pub format: String,         // default album
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://api.discogs.com/")
                .expect("static catalog url"),
            token: None,
            per_page: 100,
            format: "album".to_string()
        }
    }
}

fn build_catalog() -> Result<CatalogConfig, IngestError> {
    let base_url = std::env::var("DISCOGS_BASE_URL")
        .unwrap_or_else(|_| "https://api.discogs.com/".to_string());
    let mut base_url = parse_url("DISCOGS_BASE_URL", &base_url)?;
    ensure_trailing_slash(&mut base_url);

    let per_page = env_to_uint("DISCOGS_PER_PAGE", 100)?;
    let per_page = u32::try_from(per_page)
        .ok()
        .filter(|p| (1..=100).contains(p))
        .ok_or_else(|| IngestError::Config(
            "DISCOGS_PER_PAGE must be within 1..=100".to_string()
        ))?;

    let format = env_opt("DISCOGS_FORMAT").unwrap_or_else(|| "album".to_string());

    Ok( CatalogConfig { base_url, token: env_opt("DISCOGS_TOKEN"), per_page, format })
}

///
/// Configuration for the media catalog receiving uploads
///
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub upload_url: Url
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            upload_url: Url::parse("http://localhost:8080/medias")
                .expect("static media url")
        }
    }
}

fn build_media() -> Result<MediaConfig, IngestError> {
    let upload_url = std::env::var("MEDIA_UPLOAD_URL")
        .unwrap_or_else(|_| "http://localhost:8080/medias".to_string());
    let upload_url = parse_url("MEDIA_UPLOAD_URL", &upload_url)?;
    Ok( MediaConfig { upload_url } )
}

///
/// Configuration for Http timeouts, pooling, etc.
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
        }
    }
}

fn build_http() -> Result<HttpConfig, IngestError> {
    let timeout = env_to_uint("HTTP_TIMEOUT_MS", HTTP_TIMEOUT)?;
    Ok( HttpConfig {
        timeout: time::Duration::from_millis(timeout),
        ..HttpConfig::default()
    })
}

///
/// Configuration for the local cover art directory
///

//
// What happens when a cover with the same sanitized name already exists
//
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    Overwrite,
    Error
}

impl CollisionPolicy {
    pub fn parse(s: &str) -> Option<CollisionPolicy> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Some(CollisionPolicy::Overwrite),
            "error"     => Some(CollisionPolicy::Error),
            _ => None
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub image_dir: PathBuf,
    pub extension: String,
    pub collision: CollisionPolicy,
    pub fs_timeout: time::Duration
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("images"),
            extension: "jpeg".to_string(),
            collision: CollisionPolicy::Overwrite,
            fs_timeout: time::Duration::from_millis(FS_TIMEOUT)
        }
    }
}

fn build_storage() -> Result<StorageConfig, IngestError> {
    let image_dir = env_opt("IMAGE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("images"));

    let collision = match env_opt("IMAGE_COLLISION") {
        Some(raw) => CollisionPolicy::parse(&raw).ok_or_else(||
            IngestError::Config(format!("IMAGE_COLLISION invalid: {raw}"))
        )?,
        None => CollisionPolicy::Overwrite
    };

    Ok( StorageConfig { image_dir, collision, ..StorageConfig::default() } )
}

#[derive(Debug, Clone)]
pub struct ConcurrencyConfig {
    pub max_inflight: usize,    // bounds connections and open files
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { max_inflight: MAX_INFLIGHT }
    }
}

fn build_concurrency() -> Result<ConcurrencyConfig, IngestError> {
    let max_inflight = env_to_uint("MAX_INFLIGHT", MAX_INFLIGHT as u64)?;
    if max_inflight == 0 {
        return Err(IngestError::Config("MAX_INFLIGHT must be positive".to_string()));
    }
    Ok( ConcurrencyConfig { max_inflight: max_inflight as usize } )
}

///
/// Configuration for Logger
///

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,release_fetcher=debug,reqwest=warn".to_string(),
            format: LogFormat::Pretty,
            with_ansi: true,
            include_file_line: true,
            include_target: true,
        }
    }
}

fn build_logging() -> Result<LoggingConfig, IngestError> {
    let format = match env_opt("LOG_FORMAT").as_deref().map(str::trim) {
        None | Some("pretty") => LogFormat::Pretty,
        Some("json") => LogFormat::Json,
        Some(other) => return Err(
            IngestError::Config(format!("LOG_FORMAT invalid: {other}"))
        )
    };
    Ok( LoggingConfig { format, ..LoggingConfig::default() } )
}

///
/// AppConfig which holds everything the pipeline and shell need
///
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub identity: IdentityConfig,
    pub catalog: CatalogConfig,
    pub media: MediaConfig,
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub concurrency: ConcurrencyConfig,
    pub logging: LoggingConfig
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, IngestError> {
    dotenvy::dotenv().ok();

    let identity    = build_identity();
    let catalog     = build_catalog()?;
    let media       = build_media()?;
    let http        = build_http()?;
    let storage     = build_storage()?;
    let concurrency = build_concurrency()?;
    let logging     = build_logging()?;

    Ok( AppConfig { identity, catalog, media, http, storage, concurrency, logging } )
}

/// Operator input the shell has to collect, read from the environment first
pub fn prefilled(var: &str) -> Option<String> {
    env_opt(var)
}

/// Required variant of `prefilled`, for non-interactive runs
pub fn required(var: &str) -> Result<String, IngestError> {
    env_check(var)
}
