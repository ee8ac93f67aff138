//! Caller identity resolution.
//!
//! The ledger never trusts an account id from a request body for
//! authenticated operations; the verifier resolves the bearer credential
//! into a [`Caller`]. Administrative adjustment additionally requires the
//! elevated role, which is checked by the engine itself.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::AccountId;

/// Privilege level attached to a verified credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Member,
    Staff,
    Admin,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized role '{0}'")]
pub struct InvalidRole(String);

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(Role::Member),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

/// A verified caller: account id plus privilege level.
#[derive(Debug, Clone)]
pub struct Caller {
    pub account: AccountId,
    pub role: Role,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("credential rejected")]
pub struct Unauthorized;

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<Caller, Unauthorized>;
}

/// Fixed token table for the bundled binary and tests.
#[derive(Debug, Default)]
pub struct StaticTokens {
    tokens: HashMap<String, Caller>,
}

impl StaticTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(
        mut self,
        token: impl Into<String>,
        account: AccountId,
        role: Role,
    ) -> Self {
        self.tokens.insert(token.into(), Caller { account, role });
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokens {
    async fn verify(&self, credential: &str) -> Result<Caller, Unauthorized> {
        self.tokens.get(credential).cloned().ok_or(Unauthorized)
    }
}
