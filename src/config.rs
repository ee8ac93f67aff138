//! Process configuration.
//!
//! Everything is read once from the environment at startup and immutable
//! afterwards, including the package price table.

use std::collections::HashMap;
use std::net::SocketAddr;

use thiserror::Error;

use crate::Coins;
use crate::auth::Role;
use crate::model::AccountId;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_MAX_TRANSFER: u64 = 100_000;
const DEFAULT_MAX_ADJUSTMENT: u64 = 1_000_000;

/// Upper bounds on the mutation endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_transfer: Coins,
    pub max_adjustment: Coins,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_transfer: Coins::new(DEFAULT_MAX_TRANSFER),
            max_adjustment: Coins::new(DEFAULT_MAX_ADJUSTMENT),
        }
    }
}

/// Immutable package-id → coins lookup, loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct PackageTable {
    packages: HashMap<String, Coins>,
}

impl PackageTable {
    pub fn coins_for(&self, package_id: &str) -> Option<Coins> {
        self.packages.get(package_id).copied()
    }

    /// Parse `id=coins` pairs, comma separated.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut packages = HashMap::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (id, coins) = pair
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidPackage(pair.to_string()))?;
            let coins: u64 = coins
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPackage(pair.to_string()))?;
            packages.insert(id.trim().to_string(), Coins::new(coins));
        }
        Ok(PackageTable { packages })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("COIN_LEDGER_WEBHOOK_SECRET must be set and non-empty")]
    MissingSecret,

    #[error("invalid listen address '{0}'")]
    InvalidAddr(String),

    #[error("invalid value for {0}: '{1}'")]
    InvalidNumber(&'static str, String),

    #[error("invalid package entry '{0}', expected id=coins")]
    InvalidPackage(String),

    #[error("invalid token entry '{0}', expected token:account:role")]
    InvalidToken(String),

    #[error("invalid seed entry '{0}', expected account=balance")]
    InvalidSeed(String),
}

/// Service configuration read from `COIN_LEDGER_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub webhook_secret: String,
    pub limits: Limits,
    pub packages: PackageTable,
    /// Bearer tokens for the static identity verifier.
    pub tokens: Vec<(String, AccountId, Role)>,
    /// Opening balances for the in-memory store.
    pub seeds: Vec<(AccountId, Coins)>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        let addr_raw = env("COIN_LEDGER_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_raw
            .parse()
            .map_err(|_| ConfigError::InvalidAddr(addr_raw))?;

        let webhook_secret =
            env("COIN_LEDGER_WEBHOOK_SECRET").ok_or(ConfigError::MissingSecret)?;

        let parse_limit = |key: &'static str, default: u64| -> Result<Coins, ConfigError> {
            match env(key) {
                Some(raw) => raw
                    .parse()
                    .map(Coins::new)
                    .map_err(|_| ConfigError::InvalidNumber(key, raw)),
                None => Ok(Coins::new(default)),
            }
        };
        let limits = Limits {
            max_transfer: parse_limit("COIN_LEDGER_MAX_TRANSFER", DEFAULT_MAX_TRANSFER)?,
            max_adjustment: parse_limit("COIN_LEDGER_MAX_ADJUSTMENT", DEFAULT_MAX_ADJUSTMENT)?,
        };

        let packages = match env("COIN_LEDGER_PACKAGES") {
            Some(raw) => PackageTable::parse(&raw)?,
            None => PackageTable::default(),
        };

        let tokens = match env("COIN_LEDGER_TOKENS") {
            Some(raw) => parse_tokens(&raw)?,
            None => Vec::new(),
        };

        let seeds = match env("COIN_LEDGER_SEED") {
            Some(raw) => parse_seeds(&raw)?,
            None => Vec::new(),
        };

        Ok(Config {
            addr,
            webhook_secret,
            limits,
            packages,
            tokens,
            seeds,
        })
    }
}

/// Parse `token:account:role` triples, comma separated.
fn parse_tokens(raw: &str) -> Result<Vec<(String, AccountId, Role)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|entry| {
            let invalid = || ConfigError::InvalidToken(entry.to_string());
            let mut parts = entry.split(':');
            let token = parts.next().filter(|t| !t.is_empty()).ok_or_else(invalid)?;
            let account = parts
                .next()
                .and_then(|a| AccountId::parse(a).ok())
                .ok_or_else(invalid)?;
            let role = parts
                .next()
                .and_then(|r| r.parse().ok())
                .ok_or_else(invalid)?;
            if parts.next().is_some() {
                return Err(invalid());
            }
            Ok((token.to_string(), account, role))
        })
        .collect()
}

/// Parse `account=balance` pairs, comma separated.
fn parse_seeds(raw: &str) -> Result<Vec<(AccountId, Coins)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|entry| {
            let invalid = || ConfigError::InvalidSeed(entry.to_string());
            let (account, balance) = entry.split_once('=').ok_or_else(invalid)?;
            let account = AccountId::parse(account.trim()).map_err(|_| invalid())?;
            let balance: u64 = balance.trim().parse().map_err(|_| invalid())?;
            Ok((account, Coins::new(balance)))
        })
        .collect()
}
