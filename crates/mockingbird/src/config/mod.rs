//! Configuration types for mockingbird.

mod listen;
mod matching;
mod recording;

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use listen::{ListenConfig, MetricsConfig};
pub use matching::{MatchingConfig, DEFAULT_ADMIN_PATH_PREFIX};
pub use recording::{ProxyAndRecordSettings, COOKIE_HEADER};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Forwarding of unmatched requests (record mode)
    #[serde(default)]
    pub proxy: ProxyAndRecordSettings,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.matching.admin_path_prefix.starts_with('/') {
            anyhow::bail!(
                "matching.admin_path_prefix must start with '/', got '{}'",
                self.matching.admin_path_prefix
            );
        }

        if self.metrics.enabled && self.metrics.port == self.listen.port {
            anyhow::bail!(
                "metrics.port ({}) must differ from listen.port",
                self.metrics.port
            );
        }

        if let Some(url) = &self.proxy.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("proxy.url must be an http(s) URL, got '{url}'");
            }
        }

        if let Some(replace) = &self.proxy.url_replace {
            if replace.old_value.is_empty() {
                anyhow::bail!("proxy.url_replace.old_value must not be empty");
            }
        }

        if (self.proxy.save_mapping || self.proxy.use_defined_request_matchers)
            && !self.proxy.is_enabled()
        {
            tracing::warn!("Record mode settings are set but proxy.url is missing; proxying stays off");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
listen:
  port: 8080
metrics:
  enabled: true
  port: 9090
matching:
  allow_partial_mapping: true
proxy:
  url: "http://upstream:8000"
  save_mapping: true
  use_defined_request_matchers: true
  excluded_headers: ["X-Request-Id"]
  excluded_cookies: ["JSESSIONID"]
  url_replace:
    old_value: "/v1/"
    new_value: "/v2/"
    ignore_case: true
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.listen.port, 8080);
        assert_eq!(config.listen.host, "0.0.0.0");
        assert!(config.metrics.enabled);
        assert!(config.matching.allow_partial_mapping);
        assert_eq!(config.matching.admin_path_prefix, "/__admin");
        assert_eq!(config.proxy.url.as_deref(), Some("http://upstream:8000"));
        assert!(config.proxy.save_mapping);
        assert_eq!(config.proxy.excluded_headers, vec!["X-Request-Id"]);
        let replace = config.proxy.url_replace.as_ref().unwrap();
        assert!(replace.ignore_case);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        config.validate().unwrap();
        assert_eq!(config.listen.port, 8080);
        assert!(!config.metrics.enabled);
        assert!(!config.matching.allow_partial_mapping);
        assert!(!config.proxy.is_enabled());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.matching.admin_path_prefix = "__admin".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.proxy.url = Some("ftp://upstream".into());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.metrics.enabled = true;
        config.metrics.port = config.listen.port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen:\n  port: 9999\nmatching:\n  allow_partial_mapping: true").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.listen.port, 9999);
        assert!(config.matching.allow_partial_mapping);
    }

    #[test]
    fn test_from_file_reports_path() {
        let err = Config::from_file("/nonexistent/mockingbird.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/mockingbird.yaml"));
    }
}
