use serde::{Deserialize, Serialize};

/// One claimable login identity at one external site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub site_name: String,
    /// Base url recorded for the site, when the store knows one
    pub site_base_url: Option<String>,
    pub username: String,
    /// Opaque handle understood only by a credential resolver
    pub credential_ref: String,
}

impl Account {
    pub fn new(id: i64, site_name: &str, username: &str, credential_ref: &str) -> Self {
        Self {
            id,
            site_name: site_name.to_string(),
            site_base_url: None,
            username: username.to_string(),
            credential_ref: credential_ref.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.site_base_url = Some(base_url.to_string());
        self
    }
}
