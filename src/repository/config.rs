use crate::core::{GridError, Result};
use std::time::Duration;

pub const ENV_FETCH_URL: &str = "GRIDEDIT_API_ENDPOINT";
pub const ENV_UPDATE_URL: &str = "GRIDEDIT_API_UPDATE_ENDPOINT";
pub const ENV_BULK_UPDATE_URL: &str = "GRIDEDIT_API_BULK_UPDATE_ENDPOINT";
pub const ENV_TIMEOUT_SECS: &str = "GRIDEDIT_API_TIMEOUT_SECS";

/// Endpoints and limits for the HTTP repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// GET: full snapshot
    pub fetch_url: String,

    /// POST: single record
    pub update_url: String,

    /// POST: batch of records
    pub bulk_update_url: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl RepositoryConfig {
    /// Bulk endpoint defaults to `<update_url>/bulk`
    pub fn new(fetch_url: &str, update_url: &str) -> Self {
        Self {
            fetch_url: fetch_url.to_string(),
            update_url: update_url.to_string(),
            bulk_update_url: format!("{}/bulk", update_url.trim_end_matches('/')),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn bulk_update_url(mut self, url: &str) -> Self {
        self.bulk_update_url = url.to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read endpoints from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| GridError::Config(format!("{} must be set", key)))
        };

        let mut config = Self::new(&required(ENV_FETCH_URL)?, &required(ENV_UPDATE_URL)?);

        if let Some(bulk) = lookup(ENV_BULK_UPDATE_URL).filter(|v| !v.trim().is_empty()) {
            config = config.bulk_update_url(&bulk);
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                GridError::Config(format!("{} must be a whole number of seconds", ENV_TIMEOUT_SECS))
            })?;
            config = config.timeout(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("fetch_url", &self.fetch_url),
            ("update_url", &self.update_url),
            ("bulk_update_url", &self.bulk_update_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(GridError::Config(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }

        if self.timeout.is_zero() {
            return Err(GridError::Config("timeout must be > 0".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_bulk_url_defaults_from_update_url() {
        let config = RepositoryConfig::new("http://api/rows", "http://api/rows/update/");
        assert_eq!(config.bulk_update_url, "http://api/rows/update/bulk");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let config = RepositoryConfig::from_lookup(lookup(&[
            (ENV_FETCH_URL, "https://crm.example.com/plants"),
            (ENV_UPDATE_URL, "https://crm.example.com/plants/update"),
            (ENV_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();

        assert_eq!(config.fetch_url, "https://crm.example.com/plants");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(
            config.bulk_update_url,
            "https://crm.example.com/plants/update/bulk"
        );
    }

    #[test]
    fn test_missing_endpoint_is_an_error() {
        let err = RepositoryConfig::from_lookup(lookup(&[(ENV_FETCH_URL, "http://a")])).unwrap_err();
        assert!(matches!(err, GridError::Config(msg) if msg.contains(ENV_UPDATE_URL)));
    }

    #[test]
    fn test_validate() {
        let bad_scheme = RepositoryConfig::new("ftp://a", "http://b");
        assert!(bad_scheme.validate().is_err());

        let zero_timeout = RepositoryConfig::new("http://a", "http://b").timeout(Duration::ZERO);
        assert!(zero_timeout.validate().is_err());

        let bad_timeout = RepositoryConfig::from_lookup(lookup(&[
            (ENV_FETCH_URL, "http://a"),
            (ENV_UPDATE_URL, "http://b"),
            (ENV_TIMEOUT_SECS, "soon"),
        ]));
        assert!(bad_timeout.is_err());
    }
}
