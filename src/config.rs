//! Credentials, file locations and tunables.

use std::{
    fs, io,
    net::Ipv4Addr,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::info;

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "ADIFPUSH_HOME";

/// Configuration load/save failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No home directory could be determined.
    #[error("cannot determine home directory")]
    NoHome,
    /// A required value was empty.
    #[error("missing value for `{0}`")]
    Missing(&'static str),
    /// Filesystem failure.
    #[error("config io: {0}")]
    Io(#[from] io::Error),
}

/// Remote logging API credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudlogConfig {
    /// Base URL of the Cloudlog install.
    pub url: String,
    /// API key issued by the server.
    pub api_key: String,
    /// Station profile the records are attributed to.
    pub station_id: String,
}

impl CloudlogConfig {
    /// Builds a config, adding `https://` when `url` has no scheme.
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        station_id: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let mut url = url.into().trim().to_string();
        let api_key = api_key.into().trim().to_string();
        let station_id = station_id.into().trim().to_string();

        if url.is_empty() {
            return Err(ConfigError::Missing("url"));
        }
        if api_key.is_empty() {
            return Err(ConfigError::Missing("apikey"));
        }
        if station_id.is_empty() {
            return Err(ConfigError::Missing("stationid"));
        }
        if !url.starts_with("http") {
            url = format!("https://{url}");
        }

        Ok(Self {
            url,
            api_key,
            station_id,
        })
    }

    /// Reads `key=value` lines from `path`.
    ///
    /// Returns `Ok(None)` when the file is absent or any of `url`, `apikey`,
    /// `stationid` is missing or empty.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let (mut url, mut api_key, mut station_id) = (None, None, None);
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim() {
                "url" => url = Some(value),
                "apikey" => api_key = Some(value),
                "stationid" => station_id = Some(value),
                _ => {}
            }
        }

        match (url, api_key, station_id) {
            (Some(u), Some(k), Some(s)) if !u.is_empty() && !k.is_empty() && !s.is_empty() => {
                Ok(Some(Self {
                    url: u,
                    api_key: k,
                    station_id: s,
                }))
            }
            _ => Ok(None),
        }
    }

    /// Writes the three values to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(
            path,
            format!(
                "url={}\napikey={}\nstationid={}\n",
                self.url, self.api_key, self.station_id
            ),
        )?;
        info!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Locations of the files this tool owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Directory holding everything below.
    pub home: PathBuf,
    /// Credentials file.
    pub config_file: PathBuf,
    /// Plain-text duplicate cache.
    pub cache_file: PathBuf,
    /// SQLite duplicate cache.
    pub cache_db: PathBuf,
}

impl AppPaths {
    /// Paths rooted at `home`.
    pub fn in_dir(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            config_file: home.join("cloudlog"),
            cache_file: home.join("uploaded_qsos"),
            cache_db: home.join("uploaded_qsos.db"),
            home,
        }
    }

    /// `$ADIFPUSH_HOME`, or `~/.adifpush`.
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::in_dir(home));
        }
        let base = directories::BaseDirs::new().ok_or(ConfigError::NoHome)?;
        Ok(Self::in_dir(base.home_dir().join(".adifpush")))
    }
}

/// Where WSJT-X writes its running log on this platform.
pub fn wsjtx_log_path() -> Result<PathBuf, ConfigError> {
    let base = directories::BaseDirs::new().ok_or(ConfigError::NoHome)?;
    let home = base.home_dir();
    let app_dir = if cfg!(windows) {
        home.join("AppData").join("Local").join("WSJT-X")
    } else if cfg!(target_os = "macos") {
        home.join("Library").join("Application Support").join("WSJT-X")
    } else {
        home.join(".local").join("share").join("WSJT-X")
    };
    Ok(app_dir.join("wsjtx_log.adi"))
}

/// Request policy for the upload client.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

/// Bounded retry for opening a log file another program holds open.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Further attempts after the first open fails.
    pub retries: u32,
    /// Fixed wait before each retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Multicast endpoint the live listener joins.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Multicast group.
    pub group: Ipv4Addr,
    /// UDP port, bound on all interfaces.
    pub port: u16,
    /// Receive buffer size.
    pub max_datagram: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            group: Ipv4Addr::new(239, 255, 0, 1),
            port: 2237,
            max_datagram: 65_535,
        }
    }
}
