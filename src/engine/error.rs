//! Error types for the ledger operations.
//!
//! Every variant carries a stable machine-readable code via `code()`;
//! the HTTP layer maps codes to statuses and never invents its own.

use thiserror::Error;

use crate::Coins;
use crate::model::AccountId;

/// Error during purchase settlement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettleError {
    #[error("event signature does not verify")]
    InvalidSignature,

    #[error("settlement carries no coins")]
    ZeroAmount,

    #[error("settlement carries no event id")]
    MissingEventId,

    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("balance write contended for account {0}")]
    Conflict(AccountId),

    #[error("event {0} is already being settled")]
    AlreadyInFlight(String),

    #[error("crediting account {0} would overflow its balance")]
    BalanceOverflow(AccountId),

    #[error("credit applied but its audit record could not be completed (reversed): {0}")]
    AuditFailed(String),

    #[error("account {0} credited but neither audited nor reversed; reconcile manually")]
    InconsistentState(AccountId),

    #[error("backing store unavailable: {0}")]
    Unavailable(String),
}

impl SettleError {
    pub fn code(&self) -> &'static str {
        match self {
            SettleError::InvalidSignature => "invalid_signature",
            SettleError::ZeroAmount | SettleError::MissingEventId => "bad_request",
            SettleError::AccountNotFound(_) => "account_not_found",
            SettleError::Conflict(_) | SettleError::AlreadyInFlight(_) => "conflict",
            SettleError::BalanceOverflow(_) => "internal",
            SettleError::AuditFailed(_) => "audit_failed",
            SettleError::InconsistentState(_) => "inconsistent_state",
            SettleError::Unavailable(_) => "unavailable",
        }
    }
}

/// Error during voucher redemption.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RedeemError {
    #[error("code is invalid or already used")]
    InvalidCode,

    #[error("validator reported a non-positive coin value")]
    ZeroValue,

    #[error("package {package} is worth {expected}, validator reported {reported}")]
    PackageMismatch {
        package: String,
        expected: Coins,
        reported: Coins,
    },

    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("balance write contended for account {0}")]
    Conflict(AccountId),

    #[error("crediting account {0} would overflow its balance")]
    BalanceOverflow(AccountId),

    #[error("voucher validator unavailable: {0}")]
    ValidatorUnavailable(String),

    #[error("backing store unavailable: {0}")]
    Unavailable(String),
}

impl RedeemError {
    pub fn code(&self) -> &'static str {
        match self {
            RedeemError::InvalidCode => "invalid_code",
            RedeemError::ZeroValue | RedeemError::PackageMismatch { .. } => "bad_request",
            RedeemError::AccountNotFound(_) => "account_not_found",
            RedeemError::Conflict(_) => "conflict",
            RedeemError::BalanceOverflow(_) => "internal",
            RedeemError::ValidatorUnavailable(_) | RedeemError::Unavailable(_) => "unavailable",
        }
    }
}

/// Error during a peer transfer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("amount {0} is outside the allowed transfer range")]
    AmountOutOfRange(Coins),

    #[error("cannot transfer coins to yourself")]
    SelfTransfer,

    #[error("sender account {0} not found")]
    SenderNotFound(AccountId),

    #[error("recipient account {0} not found")]
    RecipientNotFound(AccountId),

    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Coins, need: Coins },

    #[error("recipient credit failed; sender was refunded")]
    CreditFailed,

    #[error("sender {0} debited but neither credited nor refunded; reconcile manually")]
    InconsistentState(AccountId),

    #[error("balance write contended for account {0}")]
    Conflict(AccountId),

    #[error("backing store unavailable: {0}")]
    Unavailable(String),
}

impl TransferError {
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::AmountOutOfRange(_) => "amount_out_of_range",
            TransferError::SelfTransfer => "self_transfer",
            TransferError::SenderNotFound(_) => "sender_not_found",
            TransferError::RecipientNotFound(_) => "recipient_not_found",
            TransferError::InsufficientBalance { .. } => "insufficient_balance",
            TransferError::CreditFailed => "credit_failed",
            TransferError::InconsistentState(_) => "inconsistent_state",
            TransferError::Conflict(_) => "conflict",
            TransferError::Unavailable(_) => "unavailable",
        }
    }
}

/// Error during an administrative adjustment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdjustError {
    #[error("caller lacks the elevated role")]
    Forbidden,

    #[error("amount {0} is outside the allowed adjustment range")]
    AmountOutOfRange(Coins),

    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("balance write contended for account {0}")]
    Conflict(AccountId),

    #[error("crediting account {0} would overflow its balance")]
    BalanceOverflow(AccountId),

    #[error("backing store unavailable: {0}")]
    Unavailable(String),
}

impl AdjustError {
    pub fn code(&self) -> &'static str {
        match self {
            AdjustError::Forbidden => "forbidden",
            AdjustError::AmountOutOfRange(_) => "amount_out_of_range",
            AdjustError::AccountNotFound(_) => "account_not_found",
            AdjustError::Conflict(_) => "conflict",
            AdjustError::BalanceOverflow(_) => "internal",
            AdjustError::Unavailable(_) => "unavailable",
        }
    }
}
