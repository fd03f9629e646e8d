//! Service configuration, read once from the environment at startup.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use tally_auth::SharedSecret;
use tally_infra::jobs::DEFAULT_LINK_TTL_SECS;
use tally_observability::LogFormat;
use tally_processing::HeaderPolicy;

pub const DEFAULT_PORT: u16 = 4000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Link signing secret; `None` means links are issued unsigned.
    pub download_secret: Option<String>,
    pub link_ttl_secs: u64,
    /// Guards upload/status and is the download fallback credential.
    pub api_key: Option<SharedSecret>,
    pub allow_origin: String,
    pub header_policy: HeaderPolicy,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            upload_dir: PathBuf::from("./uploads"),
            output_dir: PathBuf::from("./output"),
            download_secret: None,
            link_ttl_secs: DEFAULT_LINK_TTL_SECS,
            api_key: None,
            allow_origin: "*".to_string(),
            header_policy: HeaderPolicy::Detect,
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    /// Read the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            bind_addr: parse_or(non_empty("BIND_ADDR"), "BIND_ADDR", defaults.bind_addr),
            port: parse_or(non_empty("PORT"), "PORT", defaults.port),
            upload_dir: non_empty("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            output_dir: non_empty("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            download_secret: non_empty("DOWNLOAD_SECRET"),
            link_ttl_secs: parse_or(
                non_empty("DOWNLOAD_EXPIRES_SEC"),
                "DOWNLOAD_EXPIRES_SEC",
                defaults.link_ttl_secs,
            ),
            api_key: lookup("UPLOAD_API_KEY").and_then(SharedSecret::new),
            allow_origin: non_empty("ALLOW_ORIGIN").unwrap_or(defaults.allow_origin),
            header_policy: match non_empty("HEADER_POLICY") {
                Some(raw) => parse_header_policy(&raw).unwrap_or_else(|| {
                    tracing::warn!(value = %raw, "HEADER_POLICY not recognized; using detect");
                    defaults.header_policy
                }),
                None => defaults.header_policy,
            },
            log_format: parse_or(non_empty("LOG_FORMAT"), "LOG_FORMAT", defaults.log_format),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    let Some(raw) = raw else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(key, value = %raw, default = ?default, "invalid configuration value; using default");
        default
    })
}

fn parse_header_policy(raw: &str) -> Option<HeaderPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "detect" => Some(HeaderPolicy::Detect),
        "present" => Some(HeaderPolicy::Present),
        "absent" => Some(HeaderPolicy::Absent),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = config(&[]);
        assert_eq!(cfg.socket_addr().to_string(), "0.0.0.0:4000");
        assert_eq!(cfg.upload_dir, PathBuf::from("./uploads"));
        assert_eq!(cfg.output_dir, PathBuf::from("./output"));
        assert_eq!(cfg.link_ttl_secs, 3600);
        assert!(cfg.download_secret.is_none());
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.allow_origin, "*");
        assert_eq!(cfg.header_policy, HeaderPolicy::Detect);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn reads_every_variable() {
        let cfg = config(&[
            ("BIND_ADDR", "127.0.0.1"),
            ("PORT", "8081"),
            ("UPLOAD_DIR", "/tmp/up"),
            ("OUTPUT_DIR", "/tmp/out"),
            ("DOWNLOAD_SECRET", "s3cret"),
            ("DOWNLOAD_EXPIRES_SEC", "60"),
            ("UPLOAD_API_KEY", "key"),
            ("ALLOW_ORIGIN", "http://localhost:5173"),
            ("HEADER_POLICY", "Absent"),
            ("LOG_FORMAT", "pretty"),
        ]);
        assert_eq!(cfg.socket_addr().to_string(), "127.0.0.1:8081");
        assert_eq!(cfg.upload_dir, PathBuf::from("/tmp/up"));
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(cfg.download_secret.as_deref(), Some("s3cret"));
        assert_eq!(cfg.link_ttl_secs, 60);
        assert!(cfg.api_key.as_ref().is_some_and(|k| k.matches(Some("key"))));
        assert_eq!(cfg.allow_origin, "http://localhost:5173");
        assert_eq!(cfg.header_policy, HeaderPolicy::Absent);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let cfg = config(&[("PORT", "eighty"), ("DOWNLOAD_EXPIRES_SEC", "-5")]);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.link_ttl_secs, DEFAULT_LINK_TTL_SECS);
    }

    #[test]
    fn empty_secrets_are_treated_as_unset() {
        let cfg = config(&[("DOWNLOAD_SECRET", ""), ("UPLOAD_API_KEY", "")]);
        assert!(cfg.download_secret.is_none());
        assert!(cfg.api_key.is_none());
    }
}
