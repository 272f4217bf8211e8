use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::{
    accounts::Account,
    claim::outcome::Outcome,
    config::Config,
    credentials::CredentialResolver,
    error::{ClaimError, Result},
    sites::{HttpClaimStrategy, SiteProfile},
};

/// Site-specific login+claim procedure.
///
/// Implementations own any session they open for the duration of one call and
/// must not write to the ledger; the executor records outcomes.
#[async_trait]
pub trait ClaimStrategy: Send + Sync {
    /// Site name this strategy is registered under
    fn site(&self) -> &str;

    async fn attempt(&self, account: &Account) -> Outcome;
}

/// Site name -> strategy, fixed once the orchestrator starts
#[derive(Default, Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn ClaimStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one HTTP strategy per configured site
    pub fn from_config(config: &Config, credentials: Arc<dyn CredentialResolver>) -> Result<Self> {
        let mut registry = Self::new();

        for site in &config.sites {
            let profile = SiteProfile::from_config(site, &config.http)?;
            registry.register(Arc::new(HttpClaimStrategy::new(profile, credentials.clone())));
        }

        info!("Registered {} claim strategies", registry.len());
        Ok(registry)
    }

    /// Register a strategy under its own site name, replacing any previous one
    pub fn register(&mut self, strategy: Arc<dyn ClaimStrategy>) {
        self.strategies.insert(strategy.site().to_string(), strategy);
    }

    pub fn resolve(&self, site_name: &str) -> Result<Arc<dyn ClaimStrategy>> {
        self.strategies
            .get(site_name)
            .cloned()
            .ok_or_else(|| ClaimError::StrategyNotFound(site_name.to_string()))
    }

    pub fn sites(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, HttpConfig, LoginMode, OrchestratorConfig, SiteConfig};
    use crate::credentials::EnvCredentialResolver;
    use crate::test_support::ScriptedStrategy;

    #[test]
    fn test_resolve_registered_and_unknown_sites() {
        let mut registry = StrategyRegistry::new();
        registry.register(Arc::new(ScriptedStrategy::always("chumba", Outcome::success(1.0))));
        registry.register(Arc::new(ScriptedStrategy::always("pulsz", Outcome::success(2.0))));

        assert_eq!(registry.resolve("chumba").unwrap().site(), "chumba");
        assert_eq!(registry.sites(), vec!["chumba", "pulsz"]);
        assert!(matches!(
            registry.resolve("funzpoints"),
            Err(ClaimError::StrategyNotFound(name)) if name == "funzpoints"
        ));
    }

    #[test]
    fn test_from_config_registers_every_site() {
        let site = |name: &str, url: &str| SiteConfig {
            name: name.to_string(),
            base_url: url.to_string(),
            login_path: "/login".to_string(),
            claim_path: "/claim".to_string(),
            login_mode: LoginMode::Form,
            amount_field: "amount".to_string(),
            token_field: "token".to_string(),
        };
        let config = Config {
            orchestrator: OrchestratorConfig::default(),
            http: HttpConfig::default(),
            database: DatabaseConfig::default(),
            sites: vec![
                site("chumba", "https://www.chumbacasino.com"),
                site("global-poker", "https://www.globalpoker.com"),
            ],
        };

        let registry = StrategyRegistry::from_config(&config, Arc::new(EnvCredentialResolver)).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.resolve("global-poker").is_ok());
    }
}
