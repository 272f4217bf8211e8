use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::{
    accounts::Account,
    claim::{
        outcome::{ErrorKind, Outcome},
        strategy::ClaimStrategy,
    },
    config::{HttpConfig, LoginMode, SiteConfig},
    credentials::{Credential, CredentialResolver},
    error::{ClaimError, Result},
};

/// Everything needed to log in and claim at one site
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub name: String,
    pub base_url: Url,
    pub login_path: String,
    pub claim_path: String,
    pub login_mode: LoginMode,
    pub amount_field: String,
    pub token_field: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl SiteProfile {
    pub fn from_config(site: &SiteConfig, http: &HttpConfig) -> Result<Self> {
        let base_url = Url::parse(&site.base_url).map_err(|e| {
            ClaimError::Config(format!("invalid base_url for site '{}': {}", site.name, e))
        })?;

        Ok(Self {
            name: site.name.clone(),
            base_url,
            login_path: site.login_path.clone(),
            claim_path: site.claim_path.clone(),
            login_mode: site.login_mode,
            amount_field: site.amount_field.clone(),
            token_field: site.token_field.clone(),
            timeout: http.timeout(),
            user_agent: http.user_agent.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Login,
    Claim,
}

/// Map a non-success HTTP status to an outcome; `None` means carry on
fn classify_status(stage: Stage, status: StatusCode) -> Option<Outcome> {
    if status.is_success() {
        return None;
    }

    let outcome = match status {
        s if s.is_server_error() => Outcome::transient(format!("site returned {}", s)),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            Outcome::transient(format!("site returned {}", status))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Outcome::permanent(ErrorKind::Authentication, format!("{:?} rejected ({})", stage, status))
        }
        StatusCode::NOT_FOUND if stage == Stage::Login => {
            Outcome::permanent(ErrorKind::Configuration, "login endpoint not found")
        }
        StatusCode::NOT_FOUND | StatusCode::CONFLICT | StatusCode::GONE => Outcome::permanent(
            ErrorKind::ClaimUnavailable,
            format!("claim not available ({})", status),
        ),
        s => match stage {
            Stage::Login => Outcome::permanent(ErrorKind::Authentication, format!("login failed ({})", s)),
            Stage::Claim => Outcome::permanent(ErrorKind::ClaimUnavailable, format!("claim failed ({})", s)),
        },
    };

    Some(outcome)
}

fn classify_transport(error: &reqwest::Error) -> Outcome {
    if error.is_builder() {
        Outcome::permanent(ErrorKind::Configuration, format!("could not build request: {}", error))
    } else if error.is_timeout() {
        Outcome::transient("request timed out")
    } else {
        Outcome::transient(format!("network error: {}", error))
    }
}

/// Decide whether a successful claim response actually confirmed a claim
pub fn classify_claim_body(body: &str, amount_field: &str) -> Outcome {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => {
            if body.to_lowercase().contains("already claimed") {
                return Outcome::permanent(ErrorKind::ClaimUnavailable, "already claimed");
            }
            return Outcome::permanent(ErrorKind::ClaimUnavailable, "unrecognised claim response");
        }
    };

    let already_claimed = value.get("already_claimed").and_then(Value::as_bool) == Some(true)
        || value.get("status").and_then(Value::as_str) == Some("already_claimed");
    if already_claimed {
        return Outcome::permanent(ErrorKind::ClaimUnavailable, "already claimed");
    }

    let claimed = value.get("claimed").and_then(Value::as_bool);
    if claimed == Some(false) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("claim not confirmed");
        return Outcome::permanent(ErrorKind::ClaimUnavailable, message);
    }

    let amount = match value.get(amount_field) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match (amount, claimed) {
        (Some(amount), _) => Outcome::success(amount),
        (None, Some(true)) => Outcome::success(0.0),
        (None, _) => Outcome::permanent(
            ErrorKind::ClaimUnavailable,
            "claim response did not confirm an amount",
        ),
    }
}

/// HTTP client state owned by a single attempt; dropped when it ends
struct ClaimSession<'a> {
    profile: &'a SiteProfile,
    client: Client,
    base_url: Url,
    bearer: Option<String>,
}

impl<'a> ClaimSession<'a> {
    fn open(profile: &'a SiteProfile, base_url: Url) -> std::result::Result<Self, Outcome> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(profile.timeout)
            .user_agent(profile.user_agent.clone())
            .build()
            .map_err(|e| {
                Outcome::permanent(ErrorKind::Configuration, format!("could not build HTTP client: {}", e))
            })?;

        Ok(Self {
            profile,
            client,
            base_url,
            bearer: None,
        })
    }

    fn url(&self, path: &str) -> std::result::Result<Url, Outcome> {
        self.base_url.join(path).map_err(|e| {
            Outcome::permanent(ErrorKind::Configuration, format!("invalid path '{}': {}", path, e))
        })
    }

    async fn login(&mut self, username: &str, credential: &Credential) -> std::result::Result<(), Outcome> {
        let url = self.url(&self.profile.login_path)?;
        debug!("Logging in to {} as {}", url, username);

        let request = match self.profile.login_mode {
            LoginMode::Form => self
                .client
                .post(url)
                .form(&[("username", username), ("password", credential.expose())]),
            LoginMode::Json => self.client.post(url).json(&json!({
                "username": username,
                "password": credential.expose(),
            })),
        };

        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        if let Some(outcome) = classify_status(Stage::Login, response.status()) {
            return Err(outcome);
        }

        if self.profile.login_mode == LoginMode::Json {
            let body: Value = response.json().await.map_err(|e| {
                Outcome::permanent(ErrorKind::Authentication, format!("unreadable login response: {}", e))
            })?;
            let token = body
                .get(&self.profile.token_field)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    Outcome::permanent(ErrorKind::Authentication, "login response carried no token")
                })?;
            self.bearer = Some(token.to_string());
        }

        Ok(())
    }

    async fn claim(&self) -> std::result::Result<Outcome, Outcome> {
        let url = self.url(&self.profile.claim_path)?;
        debug!("Claiming at {}", url);

        let mut request = self.client.post(url);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        if let Some(outcome) = classify_status(Stage::Claim, response.status()) {
            return Err(outcome);
        }

        let body = response.text().await.map_err(|e| classify_transport(&e))?;
        Ok(classify_claim_body(&body, &self.profile.amount_field))
    }
}

/// Logs in over HTTP and posts to the site's claim endpoint
pub struct HttpClaimStrategy {
    profile: SiteProfile,
    credentials: Arc<dyn CredentialResolver>,
}

impl HttpClaimStrategy {
    pub fn new(profile: SiteProfile, credentials: Arc<dyn CredentialResolver>) -> Self {
        Self { profile, credentials }
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    fn base_url_for(&self, account: &Account) -> std::result::Result<Url, Outcome> {
        match &account.site_base_url {
            Some(raw) => Url::parse(raw).map_err(|e| {
                Outcome::permanent(ErrorKind::Configuration, format!("invalid site url '{}': {}", raw, e))
            }),
            None => Ok(self.profile.base_url.clone()),
        }
    }

    async fn login_and_claim(&self, account: &Account) -> std::result::Result<Outcome, Outcome> {
        let credential = self
            .credentials
            .resolve(account)
            .await
            .map_err(|e| Outcome::permanent(ErrorKind::Authentication, e.to_string()))?;

        let mut session = ClaimSession::open(&self.profile, self.base_url_for(account)?)?;
        session.login(&account.username, &credential).await?;
        session.claim().await
    }
}

#[async_trait]
impl ClaimStrategy for HttpClaimStrategy {
    fn site(&self) -> &str {
        &self.profile.name
    }

    async fn attempt(&self, account: &Account) -> Outcome {
        match self.login_and_claim(account).await {
            Ok(outcome) | Err(outcome) => outcome,
        }
    }
}
