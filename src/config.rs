// src/config.rs
use crate::error::ConfigError;
use std::env;
use std::time::Duration;

const DEFAULT_JWT_SECRET: &str = "default_secret";

/// Runtime configuration, read once from the environment at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub anthropic_api_key: Option<String>,
    pub claude_model: Option<String>,
    pub gemini_api_key: Option<String>,
    pub pexels_api_key: Option<String>,
    pub output_dir: String,
    /// How long terminal jobs stay readable. `None` keeps them forever.
    pub job_ttl: Option<Duration>,
    /// Running jobs silent for longer than this are failed by the sweeper.
    pub stale_job_after: Option<Duration>,
    pub sweep_interval: Duration,
    pub max_ad_images: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            database_url: None,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            anthropic_api_key: None,
            claude_model: None,
            gemini_api_key: None,
            pexels_api_key: None,
            output_dir: "outputs".to_string(),
            job_ttl: Some(Duration::from_secs(24 * 3600)),
            stale_job_after: None,
            sweep_interval: Duration::from_secs(300),
            max_ad_images: 3,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set, falling back to the insecure default secret");
                defaults.jwt_secret
            }
        };

        let job_ttl = match parse_u64(&get, "JOB_TTL_HOURS")? {
            Some(0) => None,
            Some(hours) => Some(Duration::from_secs(hours * 3600)),
            None => defaults.job_ttl,
        };

        let stale_job_after = parse_u64(&get, "STALE_JOB_MINUTES")?
            .filter(|m| *m > 0)
            .map(|m| Duration::from_secs(m * 60));

        let sweep_interval = parse_u64(&get, "SWEEP_INTERVAL_SECS")?
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.sweep_interval);

        let max_ad_images = match parse_u64(&get, "MAX_AD_IMAGES")? {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    key: "MAX_AD_IMAGES",
                    value: "0".to_string(),
                })
            }
            Some(n) => n as usize,
            None => defaults.max_ad_images,
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: get("DATABASE_URL"),
            jwt_secret,
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            claude_model: get("CLAUDE_MODEL"),
            gemini_api_key: get("GEMINI_API_KEY"),
            pexels_api_key: get("PEXELS_API_KEY"),
            output_dir: get("OUTPUT_DIR").unwrap_or(defaults.output_dir),
            job_ttl,
            stale_job_after,
            sweep_interval,
            max_ad_images,
        })
    }
}

fn parse_u64<G>(get: &G, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(None),
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert!(config.database_url.is_none());
        assert_eq!(config.job_ttl, Some(Duration::from_secs(24 * 3600)));
        assert!(config.stale_job_after.is_none());
        assert_eq!(config.max_ad_images, 3);
    }

    #[test]
    fn test_zero_ttl_disables_expiry() {
        let config = AppConfig::from_lookup(lookup(&[
            ("JOB_TTL_HOURS", "0"),
            ("STALE_JOB_MINUTES", "15"),
            ("ANTHROPIC_API_KEY", "  "),
        ]))
        .unwrap();
        assert!(config.job_ttl.is_none());
        assert_eq!(config.stale_job_after, Some(Duration::from_secs(900)));
        assert!(config.anthropic_api_key.is_none());
    }

    #[test]
    fn test_malformed_number_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("SWEEP_INTERVAL_SECS", "soon")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "SWEEP_INTERVAL_SECS",
                value: "soon".to_string()
            }
        );
    }
}
