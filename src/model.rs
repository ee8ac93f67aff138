//! Core domain types for the coin ledger.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::Coins;

/// Maximum length of an account identifier.
const MAX_ACCOUNT_ID_LEN: usize = 64;

/// Opaque account identifier, owned by the external identity system.
///
/// Well-formedness is checked on construction: non-empty, at most 64
/// characters, ASCII alphanumerics plus `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct AccountId(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed account identifier '{0}'")]
pub struct InvalidAccountId(String);

impl AccountId {
    pub fn parse(raw: &str) -> Result<Self, InvalidAccountId> {
        let well_formed = !raw.is_empty()
            && raw.len() <= MAX_ACCOUNT_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !well_formed {
            return Err(InvalidAccountId(raw.to_string()));
        }
        Ok(AccountId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccountId {
    type Err = InvalidAccountId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountId::parse(s)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        AccountId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// The kind of balance mutation a transaction record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Purchase,
    Voucher,
    Donation,
    AdminGrant,
    AdminRevoke,
}

/// Lifecycle state of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

/// Append-only audit row describing one balance mutation.
///
/// `external_reference` carries the processor event id for purchases and
/// the redeemed code for vouchers; settlement replay detection keys on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxRecord {
    pub id: Uuid,
    pub kind: TxKind,
    pub amount: Coins,
    pub source: Option<AccountId>,
    pub dest: Option<AccountId>,
    pub external_reference: Option<String>,
    pub status: TxStatus,
    pub created_at: DateTime<Utc>,
}

impl TxRecord {
    fn completed(
        kind: TxKind,
        amount: Coins,
        source: Option<AccountId>,
        dest: Option<AccountId>,
        external_reference: Option<String>,
    ) -> Self {
        TxRecord {
            id: Uuid::new_v4(),
            kind,
            amount,
            source,
            dest,
            external_reference,
            status: TxStatus::Completed,
            created_at: Utc::now(),
        }
    }

    /// Purchase records start pending: appending one claims the event id
    /// in the transaction log, and the record is completed only once the
    /// credit has landed.
    pub fn purchase(dest: AccountId, amount: Coins, event_id: String) -> Self {
        TxRecord {
            id: Uuid::new_v4(),
            kind: TxKind::Purchase,
            amount,
            source: None,
            dest: Some(dest),
            external_reference: Some(event_id),
            status: TxStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn voucher(dest: AccountId, amount: Coins, code: String) -> Self {
        Self::completed(TxKind::Voucher, amount, None, Some(dest), Some(code))
    }

    pub fn donation(source: AccountId, dest: AccountId, amount: Coins) -> Self {
        Self::completed(TxKind::Donation, amount, Some(source), Some(dest), None)
    }

    pub fn admin_grant(dest: AccountId, amount: Coins) -> Self {
        Self::completed(TxKind::AdminGrant, amount, None, Some(dest), None)
    }

    pub fn admin_revoke(source: AccountId, amount: Coins) -> Self {
        Self::completed(TxKind::AdminRevoke, amount, Some(source), None, None)
    }
}

/// Signed settlement event from the external payment processor.
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementEvent {
    pub account_id: AccountId,
    pub coins: Coins,
    pub event_id: String,
    pub signature: String,
}

/// Result of a settlement, also returned on idempotent replay.
#[derive(Debug, Clone, Serialize)]
pub struct SettleOutcome {
    pub coins: Coins,
    pub balance: Coins,
    pub replayed: bool,
}

/// Voucher redemption request from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct RedeemRequest {
    pub code: String,
    pub account_id: AccountId,
    pub package_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedeemOutcome {
    pub coins: Coins,
    pub balance: Coins,
}

/// Peer transfer request body; the sender comes from the credential,
/// never from the body.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub to_account_id: AccountId,
    pub amount: Coins,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub amount: Coins,
    pub from_balance: Coins,
    pub to_balance: Coins,
}

/// Direction of an administrative adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustOp {
    Add,
    Remove,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustRequest {
    pub account_id: AccountId,
    pub amount: Coins,
    pub operation: AdjustOp,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustOutcome {
    pub previous_balance: Coins,
    pub new_balance: Coins,
}
