use async_trait::async_trait;
use std::fmt;

use crate::{
    accounts::Account,
    error::{ClaimError, Result},
};

/// Plaintext secret for one login; never printed
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Turns an account's opaque `credential_ref` into a usable secret
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, account: &Account) -> Result<Credential>;
}

/// Resolves `env:NAME` (or a bare `NAME`) from the process environment
#[derive(Debug, Default, Clone)]
pub struct EnvCredentialResolver;

impl EnvCredentialResolver {
    fn variable_name(credential_ref: &str) -> &str {
        credential_ref
            .strip_prefix("env:")
            .unwrap_or(credential_ref)
            .trim()
    }
}

#[async_trait]
impl CredentialResolver for EnvCredentialResolver {
    async fn resolve(&self, account: &Account) -> Result<Credential> {
        let name = Self::variable_name(&account.credential_ref);
        if name.is_empty() {
            return Err(ClaimError::Credential(format!(
                "account {} has an empty credential reference",
                account.id
            )));
        }

        match std::env::var(name) {
            Ok(secret) if !secret.is_empty() => Ok(Credential::new(secret)),
            _ => Err(ClaimError::Credential(format!(
                "environment variable {} is not set for account {}",
                name, account.id
            ))),
        }
    }
}
