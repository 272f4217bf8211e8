use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::claim::retry::RetryPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub worker_pool_size: usize,
    pub schedule_interval_secs: u64,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 5,
            schedule_interval_secs: 24 * 60 * 60,
            max_retries: 3,
            base_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
                .to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "sweep_keeper.db".to_string(),
        }
    }
}

/// How a site expects the login exchange to be performed
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoginMode {
    /// Form-encoded POST; the session lives in cookies
    #[default]
    Form,
    /// JSON POST returning a bearer token
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_claim_path")]
    pub claim_path: String,
    #[serde(default)]
    pub login_mode: LoginMode,
    #[serde(default = "default_amount_field")]
    pub amount_field: String,
    #[serde(default = "default_token_field")]
    pub token_field: String,
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_claim_path() -> String {
    "/claim".to_string()
}

fn default_amount_field() -> String {
    "amount".to_string()
}

fn default_token_field() -> String {
    "token".to_string()
}

impl Config {
    /// Load configuration from `config/default`, an optional explicit file and
    /// `SWEEP__*` environment variables, in that order of precedence.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let config = builder
            .add_source(config::Environment::with_prefix("SWEEP").separator("__"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let orchestrator = &self.orchestrator;

        if orchestrator.worker_pool_size == 0 {
            anyhow::bail!("orchestrator.worker_pool_size must be at least 1");
        }
        if orchestrator.max_retries == 0 {
            anyhow::bail!("orchestrator.max_retries must be at least 1");
        }
        if orchestrator.schedule_interval_secs < 60 {
            anyhow::bail!(
                "orchestrator.schedule_interval_secs must be at least 60 (got {})",
                orchestrator.schedule_interval_secs
            );
        }
        if orchestrator.base_backoff_ms > orchestrator.max_backoff_ms {
            anyhow::bail!(
                "orchestrator.base_backoff_ms ({}) exceeds max_backoff_ms ({})",
                orchestrator.base_backoff_ms,
                orchestrator.max_backoff_ms
            );
        }

        let mut seen = HashSet::new();
        for site in &self.sites {
            if site.name.trim().is_empty() {
                anyhow::bail!("site name must not be empty");
            }
            if !seen.insert(site.name.as_str()) {
                anyhow::bail!("site '{}' is configured more than once", site.name);
            }
            url::Url::parse(&site.base_url)
                .map_err(|e| anyhow::anyhow!("Invalid base_url for site '{}': {}", site.name, e))?;
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.orchestrator.max_retries,
            Duration::from_millis(self.orchestrator.base_backoff_ms),
            Duration::from_millis(self.orchestrator.max_backoff_ms),
        )
    }

    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.orchestrator.schedule_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            orchestrator: OrchestratorConfig::default(),
            http: HttpConfig::default(),
            database: DatabaseConfig::default(),
            sites: vec![SiteConfig {
                name: "chumba".to_string(),
                base_url: "https://www.chumbacasino.com".to_string(),
                login_path: default_login_path(),
                claim_path: default_claim_path(),
                login_mode: LoginMode::Form,
                amount_field: default_amount_field(),
                token_field: default_token_field(),
            }],
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = base_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.orchestrator.worker_pool_size, 5);
        assert_eq!(config.schedule_interval(), Duration::from_secs(86_400));

        assert_eq!(config.http.timeout(), Duration::from_secs(20));

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
    }

    #[test]
    fn test_rejects_zero_pool() {
        let mut config = base_config();
        config.orchestrator.worker_pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_sub_minute_interval() {
        let mut config = base_config();
        config.orchestrator.schedule_interval_secs = 30;
        assert!(config.validate().is_err());

        config.orchestrator.schedule_interval_secs = 60;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_backoff() {
        let mut config = base_config();
        config.orchestrator.base_backoff_ms = 60_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_and_malformed_sites() {
        let mut config = base_config();
        config.sites.push(config.sites[0].clone());
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.sites[0].base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shipped_default_config_is_valid() {
        let raw = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let config: Config = raw.try_deserialize().unwrap();
        assert!(config.validate().is_ok());

        let names: Vec<&str> = config.sites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["chumba", "luckyland", "global-poker", "funzpoints", "pulsz"]);
        assert!(config.sites.iter().all(|s| s.login_mode == LoginMode::Form));
        assert_eq!(config.sites[1].base_url, "https://www.luckylandslots.com");
    }

    #[test]
    fn test_deserializes_site_defaults() {
        let raw = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [orchestrator]
                worker_pool_size = 8

                [[sites]]
                name = "pulsz"
                base_url = "https://www.pulsz.com"
                login_mode = "json"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let config: Config = raw.try_deserialize().unwrap();
        assert_eq!(config.orchestrator.worker_pool_size, 8);
        assert_eq!(config.orchestrator.max_retries, 3);
        assert_eq!(config.sites[0].login_mode, LoginMode::Json);
        assert_eq!(config.sites[0].claim_path, "/claim");
        assert_eq!(config.database.path, "sweep_keeper.db");
    }
}
