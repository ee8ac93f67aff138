//! Ledger operations.
//!
//! The four mutation entry points of the coin ledger: purchase
//! settlement, voucher redemption, peer transfer, and administrative
//! adjustment. Handlers are stateless; all state lives behind the
//! collaborator traits, and every balance write goes through the bounded
//! versioned retry loop in [`crate::store::mutate`].

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::Coins;
use crate::auth::{Caller, Role};
use crate::config::{Limits, PackageTable};
use crate::ledger::{LogError, TransactionLog};
use crate::model::{
    AccountId, AdjustOp, AdjustOutcome, AdjustRequest, RedeemOutcome, RedeemRequest,
    SettleOutcome, SettlementEvent, TransferOutcome, TxKind, TxRecord, TxStatus,
};
use crate::notify::Conversations;
use crate::signature;
use crate::store::{BalanceStore, MutateError, StoreError, mutate};
use crate::voucher::VoucherValidator;

mod error;
pub use error::{AdjustError, RedeemError, SettleError, TransferError};

/// Marker for a credit that would overflow the backing integer.
struct Overflow;

/// Marker for a debit larger than the freshly read balance; carries the
/// balance that was observed.
struct Shortfall(Coins);

/// The coin ledger service.
pub struct Ledger {
    store: Arc<dyn BalanceStore>,
    log: Arc<dyn TransactionLog>,
    vouchers: Arc<dyn VoucherValidator>,
    conversations: Arc<dyn Conversations>,
    secret: Vec<u8>,
    limits: Limits,
    packages: PackageTable,
}

impl Ledger {
    pub fn new(
        store: Arc<dyn BalanceStore>,
        log: Arc<dyn TransactionLog>,
        vouchers: Arc<dyn VoucherValidator>,
        conversations: Arc<dyn Conversations>,
        secret: impl Into<Vec<u8>>,
        limits: Limits,
        packages: PackageTable,
    ) -> Self {
        Ledger {
            store,
            log,
            vouchers,
            conversations,
            secret: secret.into(),
            limits,
            packages,
        }
    }

    /// Apply a settlement event from the payment processor.
    ///
    /// Idempotent on the processor event id: a replayed event is
    /// acknowledged without a second credit.
    pub async fn settle(&self, event: SettlementEvent) -> Result<SettleOutcome, SettleError> {
        let SettlementEvent {
            account_id,
            coins,
            event_id,
            signature: sig,
        } = event;

        if !signature::verify(&self.secret, &event_id, &account_id, coins, &sig) {
            warn!(account = %account_id, event = %event_id, "settlement rejected: bad signature");
            return Err(SettleError::InvalidSignature);
        }
        if event_id.trim().is_empty() {
            return Err(SettleError::MissingEventId);
        }
        if coins.is_zero() {
            return Err(SettleError::ZeroAmount);
        }

        // The log is the idempotency gate: appending the pending record
        // claims the event id, so of any number of concurrent deliveries
        // exactly one proceeds to credit.
        let record = TxRecord::purchase(account_id.clone(), coins, event_id.clone());
        let record_id = record.id;
        match self.log.append(record).await {
            Ok(()) => {}
            Err(LogError::AlreadyRecorded(_)) => {
                let existing = self
                    .log
                    .find_by_reference(&event_id)
                    .await
                    .map_err(|e| SettleError::Unavailable(e.to_string()))?;
                return match existing {
                    Some(record)
                        if record.kind == TxKind::Purchase
                            && record.status == TxStatus::Completed =>
                    {
                        let (balance, _) =
                            self.store.get(&account_id).await.map_err(settle_store)?;
                        info!(account = %account_id, event = %event_id, "settlement replay acknowledged");
                        Ok(SettleOutcome {
                            coins: record.amount,
                            balance,
                            replayed: true,
                        })
                    }
                    // Another delivery holds the claim; the processor
                    // retries once it resolves.
                    _ => Err(SettleError::AlreadyInFlight(event_id)),
                };
            }
            Err(e) => return Err(SettleError::Unavailable(e.to_string())),
        }

        let credit = mutate(self.store.as_ref(), &account_id, |bal| {
            bal.checked_add(coins).ok_or(Overflow)
        })
        .await;
        let (_, balance) = match credit {
            Ok(balances) => balances,
            Err(credit_err) => {
                // Nothing was credited; release the claim so the
                // processor's retry can settle the event.
                if let Err(release_err) =
                    self.log.set_status(record_id, TxStatus::Failed).await
                {
                    error!(
                        account = %account_id,
                        event = %event_id,
                        error = %release_err,
                        "settlement credit failed and its pending record is stuck; reconcile manually"
                    );
                    return Err(SettleError::InconsistentState(account_id));
                }
                return Err(match credit_err {
                    MutateError::Store(e) => settle_store(e),
                    MutateError::Aborted(Overflow) => SettleError::BalanceOverflow(account_id),
                });
            }
        };

        if let Err(complete_err) = self.log.set_status(record_id, TxStatus::Completed).await {
            // Compensate-or-report: reverse the credit so the processor
            // can retry, or flag the account for manual reconciliation.
            let reversal = mutate(self.store.as_ref(), &account_id, |bal| {
                bal.checked_sub(coins).ok_or(Shortfall(bal))
            })
            .await;
            return Err(match reversal {
                Ok(_) => {
                    if let Err(e) = self.log.set_status(record_id, TxStatus::Failed).await {
                        warn!(event = %event_id, error = %e, "reversed settlement record left pending");
                    }
                    warn!(
                        account = %account_id,
                        event = %event_id,
                        error = %complete_err,
                        "settlement audit record not completed, credit reversed"
                    );
                    SettleError::AuditFailed(complete_err.to_string())
                }
                Err(_) => {
                    error!(
                        account = %account_id,
                        event = %event_id,
                        error = %complete_err,
                        "settlement credited without a completed audit record and reversal failed"
                    );
                    SettleError::InconsistentState(account_id)
                }
            });
        }

        info!(account = %account_id, event = %event_id, coins = %coins, "settlement applied");
        Ok(SettleOutcome {
            coins,
            balance,
            replayed: false,
        })
    }

    /// Redeem a voucher code for the given account.
    ///
    /// Single-use enforcement is owned by the external validator.
    pub async fn redeem(&self, request: RedeemRequest) -> Result<RedeemOutcome, RedeemError> {
        let RedeemRequest {
            code,
            account_id,
            package_id,
        } = request;

        let outcome = self
            .vouchers
            .validate(&code)
            .await
            .map_err(|e| RedeemError::ValidatorUnavailable(e.to_string()))?;
        if !outcome.success {
            info!(account = %account_id, "voucher rejected by validator");
            return Err(RedeemError::InvalidCode);
        }

        let coins = Coins::new(outcome.virtual_currency);
        if coins.is_zero() {
            return Err(RedeemError::ZeroValue);
        }
        if let Some(package) = &package_id
            && let Some(expected) = self.packages.coins_for(package)
            && expected != coins
        {
            return Err(RedeemError::PackageMismatch {
                package: package.clone(),
                expected,
                reported: coins,
            });
        }

        let (_, balance) = mutate(self.store.as_ref(), &account_id, |bal| {
            bal.checked_add(coins).ok_or(Overflow)
        })
        .await
        .map_err(|e| match e {
            MutateError::Store(StoreError::NotFound(id)) => RedeemError::AccountNotFound(id),
            MutateError::Store(StoreError::Conflict(id)) => RedeemError::Conflict(id),
            MutateError::Store(StoreError::Unavailable(m)) => RedeemError::Unavailable(m),
            MutateError::Aborted(Overflow) => RedeemError::BalanceOverflow(account_id.clone()),
        })?;

        // The validator already consumed the code, so a failed audit
        // append is not reversed: reversing would strand the user's coins.
        let record = TxRecord::voucher(account_id.clone(), coins, code);
        if let Err(e) = self.log.append(record).await {
            warn!(account = %account_id, error = %e, "voucher audit append failed");
        }

        info!(account = %account_id, coins = %coins, "voucher redeemed");
        Ok(RedeemOutcome { coins, balance })
    }

    /// Move coins from the verified sender to a recipient.
    ///
    /// Debit and credit are independent writes; a failed credit refunds
    /// the sender, and a failed refund is reported distinctly so an
    /// operator can reconcile.
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Coins,
    ) -> Result<TransferOutcome, TransferError> {
        if amount.is_zero() || amount > self.limits.max_transfer {
            return Err(TransferError::AmountOutOfRange(amount));
        }
        if from == to {
            return Err(TransferError::SelfTransfer);
        }

        let (sender_balance, _) = self.store.get(&from).await.map_err(|e| match e {
            StoreError::NotFound(id) => TransferError::SenderNotFound(id),
            StoreError::Conflict(id) => TransferError::Conflict(id),
            StoreError::Unavailable(m) => TransferError::Unavailable(m),
        })?;
        if sender_balance < amount {
            return Err(TransferError::InsufficientBalance {
                have: sender_balance,
                need: amount,
            });
        }

        // Resolve the recipient before touching the sender's balance.
        self.store.get(&to).await.map_err(|e| match e {
            StoreError::NotFound(id) => TransferError::RecipientNotFound(id),
            StoreError::Conflict(id) => TransferError::Conflict(id),
            StoreError::Unavailable(m) => TransferError::Unavailable(m),
        })?;

        // Debit; the balance check reruns on every retry attempt.
        let (_, from_balance) = mutate(self.store.as_ref(), &from, |bal| {
            bal.checked_sub(amount).ok_or(Shortfall(bal))
        })
        .await
        .map_err(|e| match e {
            MutateError::Aborted(Shortfall(have)) => TransferError::InsufficientBalance {
                have,
                need: amount,
            },
            MutateError::Store(StoreError::NotFound(id)) => TransferError::SenderNotFound(id),
            MutateError::Store(StoreError::Conflict(id)) => TransferError::Conflict(id),
            MutateError::Store(StoreError::Unavailable(m)) => TransferError::Unavailable(m),
        })?;

        let to_balance = match mutate(self.store.as_ref(), &to, |bal| {
            bal.checked_add(amount).ok_or(Overflow)
        })
        .await
        {
            Ok((_, balance)) => balance,
            Err(_) => {
                warn!(from = %from, to = %to, amount = %amount, "recipient credit failed, refunding sender");
                let refund = mutate(self.store.as_ref(), &from, |bal| {
                    bal.checked_add(amount).ok_or(Overflow)
                })
                .await;
                return Err(match refund {
                    Ok(_) => TransferError::CreditFailed,
                    Err(_) => {
                        error!(
                            from = %from,
                            to = %to,
                            amount = %amount,
                            "transfer debited sender but neither credit nor refund succeeded"
                        );
                        TransferError::InconsistentState(from)
                    }
                });
            }
        };

        let record = TxRecord::donation(from.clone(), to.clone(), amount);
        if let Err(e) = self.log.append(record).await {
            warn!(from = %from, to = %to, error = %e, "donation audit append failed");
        }

        self.notify_gift(&from, &to, amount).await;

        info!(from = %from, to = %to, amount = %amount, "transfer applied");
        Ok(TransferOutcome {
            amount,
            from_balance,
            to_balance,
        })
    }

    /// Credit or debit an arbitrary account on behalf of an elevated
    /// caller. `remove` floors at zero instead of failing.
    pub async fn adjust(
        &self,
        caller: &Caller,
        request: AdjustRequest,
    ) -> Result<AdjustOutcome, AdjustError> {
        // The elevated role exactly; staff is not enough.
        if caller.role != Role::Admin {
            warn!(caller = %caller.account, "adjustment rejected: caller is not admin");
            return Err(AdjustError::Forbidden);
        }

        let AdjustRequest {
            account_id,
            amount,
            operation,
        } = request;

        if amount.is_zero() || amount > self.limits.max_adjustment {
            return Err(AdjustError::AmountOutOfRange(amount));
        }

        let (previous, new) = mutate(self.store.as_ref(), &account_id, |bal| match operation {
            AdjustOp::Add => bal.checked_add(amount).ok_or(Overflow),
            AdjustOp::Remove => Ok(bal.saturating_sub(amount)),
        })
        .await
        .map_err(|e| match e {
            MutateError::Store(StoreError::NotFound(id)) => AdjustError::AccountNotFound(id),
            MutateError::Store(StoreError::Conflict(id)) => AdjustError::Conflict(id),
            MutateError::Store(StoreError::Unavailable(m)) => AdjustError::Unavailable(m),
            MutateError::Aborted(Overflow) => AdjustError::BalanceOverflow(account_id.clone()),
        })?;

        // Record the delta actually applied, which for a floored removal
        // is smaller than the requested amount.
        let record = match operation {
            AdjustOp::Add => Some(TxRecord::admin_grant(account_id.clone(), amount)),
            AdjustOp::Remove => {
                let removed = previous.saturating_sub(new);
                (!removed.is_zero()).then(|| TxRecord::admin_revoke(account_id.clone(), removed))
            }
        };
        if let Some(record) = record
            && let Err(e) = self.log.append(record).await
        {
            warn!(account = %account_id, error = %e, "adjustment audit append failed");
        }

        info!(
            admin = %caller.account,
            account = %account_id,
            operation = ?operation,
            amount = %amount,
            "adjustment applied"
        );
        Ok(AdjustOutcome {
            previous_balance: previous,
            new_balance: new,
        })
    }

    /// Best-effort gift notification; never affects the monetary result.
    async fn notify_gift(&self, from: &AccountId, to: &AccountId, amount: Coins) {
        let conversation = match self.conversations.find_or_create(from, to).await {
            Ok(conversation) => conversation,
            Err(e) => {
                warn!(from = %from, to = %to, error = %e, "gift notification skipped: conversation lookup failed");
                return;
            }
        };
        let text = format!("You received a gift of {amount} EliteCoins from {from}.");
        if let Err(e) = self.conversations.post(conversation, from, &text).await {
            warn!(from = %from, to = %to, error = %e, "gift notification skipped: message post failed");
        }
    }
}

fn settle_store(e: StoreError) -> SettleError {
    match e {
        StoreError::NotFound(id) => SettleError::AccountNotFound(id),
        StoreError::Conflict(id) => SettleError::Conflict(id),
        StoreError::Unavailable(m) => SettleError::Unavailable(m),
    }
}
