//! Service configuration.
//!
//! Configuration is resolved once at process startup and then passed into the services, so no
//! environment variable is read while a refresh or a request is being handled. Every setting
//! has a pure `*_from_env_value` parser that can be tested without touching the process
//! environment.

use crate::constants::{
    DEFAULT_HTTP_ADDR, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_PIE_DATA_DIR,
    DEFAULT_REFRESH_CONCURRENCY, DEFAULT_REFRESH_INTERVAL_SECS, PIES_PATH,
};
use crate::error::{ConfigError, ConfigResult};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_HTTP_ADDR: &str = "RISKSERVICE_HTTP_ADDR";
pub const ENV_PUBLIC_URL: &str = "RISKSERVICE_PUBLIC_URL";
pub const ENV_MODE: &str = "RISKSERVICE_MODE";
pub const ENV_FHIR_ENDPOINT: &str = "FHIR_ENDPOINT";
pub const ENV_REDCAP_ENDPOINT: &str = "REDCAP_ENDPOINT";
pub const ENV_REDCAP_TOKEN: &str = "REDCAP_TOKEN";
pub const ENV_PIE_DATA_DIR: &str = "PIE_DATA_DIR";
pub const ENV_REFRESH_INTERVAL_SECS: &str = "REFRESH_INTERVAL_SECS";
pub const ENV_REFRESH_ON_STARTUP: &str = "REFRESH_ON_STARTUP";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
pub const ENV_REFRESH_CONCURRENCY: &str = "REFRESH_CONCURRENCY";

/// Where studies come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceMode {
    /// Survey export, resolved to patients by MRN.
    Survey { endpoint: String, token: String },
    /// Synthetic trajectories for every patient on the clinical server.
    Synthetic,
}

/// Which kind of source a mode string selects, before its settings are read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeKind {
    Survey,
    Synthetic,
}

impl FromStr for ModeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "survey" | "redcap" => Ok(ModeKind::Survey),
            "synthetic" | "mock" => Ok(ModeKind::Synthetic),
            other => Err(format!("unknown mode {other:?}, expected survey or synthetic")),
        }
    }
}

/// Service configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    http_addr: SocketAddr,
    public_url: String,
    fhir_endpoint: String,
    mode: SourceMode,
    pie_data_dir: PathBuf,
    refresh_interval: Option<Duration>,
    refresh_on_startup: bool,
    http_timeout: Duration,
    refresh_concurrency: usize,
}

impl ServiceConfig {
    /// Create a new `ServiceConfig` with defaults for everything but the required settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `fhir_endpoint` is not an http(s) URL.
    pub fn new(
        http_addr: SocketAddr,
        public_url: String,
        fhir_endpoint: String,
        mode: SourceMode,
    ) -> ConfigResult<Self> {
        let fhir_endpoint = http_url_from_env_value(ENV_FHIR_ENDPOINT, Some(fhir_endpoint))?;
        Ok(Self {
            http_addr,
            public_url: public_url.trim_end_matches('/').to_string(),
            fhir_endpoint,
            mode,
            pie_data_dir: PathBuf::from(DEFAULT_PIE_DATA_DIR),
            refresh_interval: Some(Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS)),
            refresh_on_startup: false,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            refresh_concurrency: DEFAULT_REFRESH_CONCURRENCY,
        })
    }

    /// Resolve configuration from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve configuration through `lookup`, which returns the raw value of a variable.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_addr = http_addr_from_env_value(lookup(ENV_HTTP_ADDR))?;
        let public_url = match non_empty(lookup(ENV_PUBLIC_URL)) {
            Some(url) => http_url_from_env_value(ENV_PUBLIC_URL, Some(url))?,
            None => discover_public_url(http_addr.port()),
        };
        let fhir_endpoint = non_empty(lookup(ENV_FHIR_ENDPOINT))
            .ok_or(ConfigError::Missing(ENV_FHIR_ENDPOINT))?;

        let mode = match mode_from_env_value(lookup(ENV_MODE))? {
            ModeKind::Survey => SourceMode::Survey {
                endpoint: http_url_from_env_value(
                    ENV_REDCAP_ENDPOINT,
                    Some(
                        non_empty(lookup(ENV_REDCAP_ENDPOINT))
                            .ok_or(ConfigError::Missing(ENV_REDCAP_ENDPOINT))?,
                    ),
                )?,
                token: non_empty(lookup(ENV_REDCAP_TOKEN))
                    .ok_or(ConfigError::Missing(ENV_REDCAP_TOKEN))?,
            },
            ModeKind::Synthetic => SourceMode::Synthetic,
        };

        let mut config = Self::new(http_addr, public_url, fhir_endpoint, mode)?;
        config.pie_data_dir = pie_data_dir_from_env_value(lookup(ENV_PIE_DATA_DIR));
        config.refresh_interval =
            refresh_interval_from_env_value(lookup(ENV_REFRESH_INTERVAL_SECS))?;
        config.refresh_on_startup =
            flag_from_env_value(ENV_REFRESH_ON_STARTUP, lookup(ENV_REFRESH_ON_STARTUP))?;
        config.http_timeout = http_timeout_from_env_value(lookup(ENV_HTTP_TIMEOUT_SECS))?;
        config.refresh_concurrency =
            refresh_concurrency_from_env_value(lookup(ENV_REFRESH_CONCURRENCY))?;
        Ok(config)
    }

    pub fn with_pie_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pie_data_dir = dir.into();
        self
    }

    pub fn with_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_refresh_concurrency(mut self, concurrency: usize) -> Self {
        self.refresh_concurrency = concurrency.max(1);
        self
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    /// Prefix under which stored pies are served, e.g. `http://10.0.0.5:9000/pies/`.
    pub fn basis_pie_url(&self) -> String {
        format!("{}{}", self.public_url, PIES_PATH)
    }

    pub fn fhir_endpoint(&self) -> &str {
        &self.fhir_endpoint
    }

    pub fn mode(&self) -> &SourceMode {
        &self.mode
    }

    pub fn pie_data_dir(&self) -> &Path {
        &self.pie_data_dir
    }

    /// Period of the scheduled refresh; `None` when scheduling is disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval
    }

    pub fn refresh_on_startup(&self) -> bool {
        self.refresh_on_startup
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    pub fn refresh_concurrency(&self) -> usize {
        self.refresh_concurrency
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_u64(name: &'static str, value: &str) -> ConfigResult<u64> {
    value.parse::<u64>().map_err(|e| ConfigError::Invalid {
        name,
        reason: format!("{value:?} is not a whole number: {e}"),
    })
}

/// Parse the listen address, defaulting to `0.0.0.0:9000`.
///
/// A bare `:port` binds every interface.
pub fn http_addr_from_env_value(value: Option<String>) -> ConfigResult<SocketAddr> {
    let raw = non_empty(value).unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
    let candidate = if raw.starts_with(':') {
        format!("0.0.0.0{raw}")
    } else {
        raw
    };
    candidate.parse().map_err(|e| ConfigError::Invalid {
        name: ENV_HTTP_ADDR,
        reason: format!("{candidate:?}: {e}"),
    })
}

/// Validate an http(s) URL setting and strip its trailing slashes.
pub fn http_url_from_env_value(name: &'static str, value: Option<String>) -> ConfigResult<String> {
    let url = non_empty(value).ok_or(ConfigError::Missing(name))?;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("{url:?} must start with http:// or https://"),
        });
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// Parse the source mode, defaulting to survey.
pub fn mode_from_env_value(value: Option<String>) -> ConfigResult<ModeKind> {
    match non_empty(value) {
        None => Ok(ModeKind::Survey),
        Some(v) => v.parse().map_err(|reason| ConfigError::Invalid {
            name: ENV_MODE,
            reason,
        }),
    }
}

pub fn pie_data_dir_from_env_value(value: Option<String>) -> PathBuf {
    PathBuf::from(non_empty(value).unwrap_or_else(|| DEFAULT_PIE_DATA_DIR.to_string()))
}

/// Parse the refresh period in seconds; `0` disables the schedule.
pub fn refresh_interval_from_env_value(value: Option<String>) -> ConfigResult<Option<Duration>> {
    let secs = match non_empty(value) {
        None => DEFAULT_REFRESH_INTERVAL_SECS,
        Some(v) => parse_u64(ENV_REFRESH_INTERVAL_SECS, &v)?,
    };
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

/// Parse a boolean flag; unset means false.
pub fn flag_from_env_value(name: &'static str, value: Option<String>) -> ConfigResult<bool> {
    match non_empty(value).map(|v| v.to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                name,
                reason: format!("{v:?} is not a boolean"),
            }),
        },
    }
}

/// Parse the per-request timeout in seconds; it must be positive.
pub fn http_timeout_from_env_value(value: Option<String>) -> ConfigResult<Duration> {
    let secs = match non_empty(value) {
        None => DEFAULT_HTTP_TIMEOUT_SECS,
        Some(v) => parse_u64(ENV_HTTP_TIMEOUT_SECS, &v)?,
    };
    if secs == 0 {
        return Err(ConfigError::Invalid {
            name: ENV_HTTP_TIMEOUT_SECS,
            reason: "timeout must be at least one second".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}

/// Parse the per-refresh study concurrency; values below 1 become 1.
pub fn refresh_concurrency_from_env_value(value: Option<String>) -> ConfigResult<usize> {
    match non_empty(value) {
        None => Ok(DEFAULT_REFRESH_CONCURRENCY),
        Some(v) => {
            let n = parse_u64(ENV_REFRESH_CONCURRENCY, &v)?;
            Ok(usize::try_from(n).unwrap_or(usize::MAX).max(1))
        }
    }
}

/// Public base URL of this process when none is configured.
///
/// Uses the first non-loopback IPv4 address, falling back to localhost.
pub fn discover_public_url(port: u16) -> String {
    match local_ip_address::local_ip() {
        Ok(IpAddr::V4(ip)) if !ip.is_loopback() => format!("http://{ip}:{port}"),
        Ok(other) => {
            tracing::warn!(
                "discovered address {} is not usable, defaulting to localhost",
                other
            );
            format!("http://localhost:{port}")
        }
        Err(e) => {
            tracing::warn!("unable to determine IP address, defaulting to localhost: {}", e);
            format!("http://localhost:{port}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn survey_mode_from_lookup() {
        let config = ServiceConfig::from_lookup(lookup(&[
            (ENV_PUBLIC_URL, "http://risk.example:9000/"),
            (ENV_FHIR_ENDPOINT, "http://fhir:3001/"),
            (ENV_REDCAP_ENDPOINT, "https://redcap.example/api"),
            (ENV_REDCAP_TOKEN, "abc"),
            (ENV_REFRESH_INTERVAL_SECS, "3600"),
            (ENV_REFRESH_ON_STARTUP, "true"),
        ]))
        .expect("valid config");

        assert_eq!(config.http_addr(), "0.0.0.0:9000".parse().expect("addr"));
        assert_eq!(config.public_url(), "http://risk.example:9000");
        assert_eq!(config.basis_pie_url(), "http://risk.example:9000/pies/");
        assert_eq!(config.fhir_endpoint(), "http://fhir:3001");
        assert_eq!(
            config.mode(),
            &SourceMode::Survey {
                endpoint: "https://redcap.example/api".into(),
                token: "abc".into(),
            }
        );
        assert_eq!(config.pie_data_dir(), Path::new("pie_data"));
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(3600)));
        assert!(config.refresh_on_startup());
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
        assert_eq!(config.refresh_concurrency(), 4);
    }

    #[test]
    fn synthetic_mode_needs_no_survey_settings() {
        let config = ServiceConfig::from_lookup(lookup(&[
            (ENV_PUBLIC_URL, "http://risk:9000"),
            (ENV_FHIR_ENDPOINT, "http://fhir:3001"),
            (ENV_MODE, "synthetic"),
        ]))
        .expect("valid config");
        assert_eq!(config.mode(), &SourceMode::Synthetic);
    }

    #[test]
    fn missing_required_settings() {
        let err = ServiceConfig::from_lookup(lookup(&[(ENV_PUBLIC_URL, "http://risk:9000")]))
            .expect_err("fhir endpoint required");
        assert!(matches!(err, ConfigError::Missing(ENV_FHIR_ENDPOINT)));

        let err = ServiceConfig::from_lookup(lookup(&[
            (ENV_PUBLIC_URL, "http://risk:9000"),
            (ENV_FHIR_ENDPOINT, "http://fhir:3001"),
            (ENV_REDCAP_ENDPOINT, "http://redcap/api"),
        ]))
        .expect_err("token required in survey mode");
        assert!(matches!(err, ConfigError::Missing(ENV_REDCAP_TOKEN)));
    }

    #[test]
    fn built_config_overrides_defaults() {
        let config = ServiceConfig::new(
            "127.0.0.1:9100".parse().expect("addr"),
            "http://127.0.0.1:9100/".into(),
            "http://fhir:3001".into(),
            SourceMode::Synthetic,
        )
        .expect("valid config")
        .with_pie_data_dir("/tmp/pies")
        .with_refresh_interval(None)
        .with_refresh_concurrency(0);

        assert_eq!(config.basis_pie_url(), "http://127.0.0.1:9100/pies/");
        assert_eq!(config.pie_data_dir(), Path::new("/tmp/pies"));
        assert_eq!(config.refresh_interval(), None);
        assert_eq!(config.refresh_concurrency(), 1);

        let err = ServiceConfig::new(
            "127.0.0.1:9100".parse().expect("addr"),
            "http://127.0.0.1:9100".into(),
            "fhir:3001".into(),
            SourceMode::Synthetic,
        )
        .expect_err("fhir endpoint must be http");
        assert!(matches!(err, ConfigError::Invalid { name: ENV_FHIR_ENDPOINT, .. }));
    }

    #[test]
    fn http_addr_accepts_bare_port() {
        assert_eq!(
            http_addr_from_env_value(Some(":9100".into())).expect("addr"),
            "0.0.0.0:9100".parse::<SocketAddr>().expect("addr")
        );
        assert_eq!(
            http_addr_from_env_value(None).expect("addr").port(),
            9000
        );
        assert!(http_addr_from_env_value(Some("nowhere".into())).is_err());
    }

    #[test]
    fn urls_must_be_http() {
        assert_eq!(
            http_url_from_env_value(ENV_FHIR_ENDPOINT, Some(" http://fhir/ ".into()))
                .expect("url"),
            "http://fhir"
        );
        assert!(matches!(
            http_url_from_env_value(ENV_FHIR_ENDPOINT, Some("fhir:3001".into())),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            http_url_from_env_value(ENV_FHIR_ENDPOINT, Some("  ".into())),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn mode_values() {
        assert_eq!(mode_from_env_value(None).expect("mode"), ModeKind::Survey);
        assert_eq!(
            mode_from_env_value(Some("Synthetic".into())).expect("mode"),
            ModeKind::Synthetic
        );
        assert!(mode_from_env_value(Some("live".into())).is_err());
    }

    #[test]
    fn refresh_interval_zero_disables() {
        assert_eq!(refresh_interval_from_env_value(Some("0".into())).expect("ok"), None);
        assert_eq!(
            refresh_interval_from_env_value(None).expect("ok"),
            Some(Duration::from_secs(86_400))
        );
        assert!(refresh_interval_from_env_value(Some("daily".into())).is_err());
    }

    #[test]
    fn flags_and_numbers() {
        assert!(!flag_from_env_value(ENV_REFRESH_ON_STARTUP, None).expect("flag"));
        assert!(flag_from_env_value(ENV_REFRESH_ON_STARTUP, Some("YES".into())).expect("flag"));
        assert!(flag_from_env_value(ENV_REFRESH_ON_STARTUP, Some("maybe".into())).is_err());

        assert!(http_timeout_from_env_value(Some("0".into())).is_err());
        assert_eq!(
            http_timeout_from_env_value(Some("5".into())).expect("timeout"),
            Duration::from_secs(5)
        );

        assert_eq!(refresh_concurrency_from_env_value(Some("0".into())).expect("n"), 1);
        assert_eq!(refresh_concurrency_from_env_value(Some("16".into())).expect("n"), 16);
        assert!(refresh_concurrency_from_env_value(Some("-1".into())).is_err());
    }

    #[test]
    fn pie_data_dir_default() {
        assert_eq!(pie_data_dir_from_env_value(None), PathBuf::from("pie_data"));
        assert_eq!(
            pie_data_dir_from_env_value(Some("/var/pies".into())),
            PathBuf::from("/var/pies")
        );
    }

    #[test]
    fn discovered_url_uses_port() {
        let url = discover_public_url(9123);
        assert!(url.starts_with("http://"));
        assert!(url.ends_with(":9123"));
    }
}
